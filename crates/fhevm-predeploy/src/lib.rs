//! Bootstrap deployment for the fhEVM core contracts.
//!
//! The core contracts reference each other's addresses as compile-time constants, so every
//! address has to be known before the first transaction is sent. This crate predicts those
//! addresses from the deployer's nonce, materializes them into config and Solidity constant
//! files, deploys the contracts in the exact nonce order that makes the predictions true and
//! stops the moment an actual address diverges from its prediction.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod error;
pub use error::*;

mod predictor;
pub use predictor::*;

mod identity;
pub use identity::*;

pub mod artifact;
pub use artifact::{ArtifactKind, ArtifactStore, FsArtifactStore};

mod materializer;
pub use materializer::*;

pub mod plan;
pub use plan::{ComponentId, ComponentSpec, DeploymentPlan, PlanDefinition};

mod compile;
pub use compile::*;

pub mod ledger;
pub use ledger::{Ledger, LedgerError, RpcLedger, TxReceipt, TxRequest};

mod retry;
pub use retry::*;

mod sequencer;
pub use sequencer::*;

mod verifier;
pub use verifier::*;

mod provisioner;
pub use provisioner::*;

mod pipeline;
pub use pipeline::*;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
