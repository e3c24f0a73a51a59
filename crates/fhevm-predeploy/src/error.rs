use std::{path::PathBuf, time::Duration};

use alloy_primitives::{Address, TxHash};

use crate::LedgerError;

/// Error types for the predeploy pipeline.
///
/// Every variant names the component or step where it occurred. All of them are fatal for the
/// remaining pipeline; a rejected capability grant is reported as
/// [`CapabilityOutcome::Denied`](crate::CapabilityOutcome::Denied) instead.
#[derive(Debug, thiserror::Error)]
pub enum PredeployError {
    /// Malformed address, nonce, plan entry or constructor argument.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Writing or reading an artifact failed.
    #[error("Artifact I/O failed for '{path}': {source}")]
    Io {
        /// The artifact path
        path: PathBuf,
        /// The underlying I/O error
        source: std::io::Error,
    },

    /// The endpoint stayed unreachable after all retries.
    #[error("Network error during {step}: {source}")]
    Network {
        /// The step that issued the request
        step: String,
        /// The last ledger error observed
        source: LedgerError,
    },

    /// A confirmation did not arrive within the configured bound.
    #[error("Timed out after {waited:?} during {step}")]
    Timeout {
        /// The step that was waiting
        step: String,
        /// How long the step waited
        waited: Duration,
    },

    /// A deployment or privileged transaction was rejected, reverted or never produced a
    /// contract.
    #[error("Deployment of {component} failed: {reason}")]
    DeploymentFailure {
        /// The component (or step) whose transaction failed
        component: String,
        /// Why the transaction failed
        reason: String,
        /// The transaction hash, if the transaction was accepted by the node
        tx_hash: Option<TxHash>,
    },

    /// The deployed address does not match the prediction.
    #[error(
        "Nonce drift detected at {component}: predicted {predicted} (nonce {nonce}), deployed at \
         {actual}"
    )]
    NonceDrift {
        /// The component whose address diverged
        component: String,
        /// The nonce the prediction assumed
        nonce: u64,
        /// The predicted address
        predicted: Address,
        /// The address reported by the receipt
        actual: Address,
    },

    /// The deployer's live nonce differs from the plan's base nonce before anything was sent.
    #[error(
        "Deployer {deployer} is at nonce {actual} but the plan expects {expected}; use another \
         deployer key or relaunch a clean node"
    )]
    UnexpectedNonce {
        /// The deployer account
        deployer: Address,
        /// The base nonce the plan was predicted with
        expected: u64,
        /// The live pending nonce
        actual: u64,
    },

    /// The capability target hosts no code.
    #[error("{address} is not a contract")]
    NotAContract {
        /// The probed address
        address: Address,
    },

    /// A materialized artifact no longer matches the current prediction.
    #[error("Artifact for {component} binds {key} to {found}, but {expected} is predicted")]
    StaleArtifact {
        /// The component the artifact belongs to
        component: String,
        /// The config key or Solidity constant that disagrees
        key: String,
        /// The value found in the artifact (empty when missing)
        found: String,
        /// The predicted address
        expected: Address,
    },

    /// The compiler output for a component is missing or unusable.
    #[error("Compilation output for {component} is unusable: {reason}")]
    Compile {
        /// The component
        component: String,
        /// Why the output could not be used
        reason: String,
    },

    /// The pipeline was cancelled before the named step was issued.
    #[error("Pipeline cancelled before {component}")]
    Cancelled {
        /// The first step that was not issued
        component: String,
    },
}

/// Coarse classification of [`PredeployError`], used for exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ErrorKind {
    /// Malformed input
    InvalidInput,
    /// Artifact I/O
    Io,
    /// Network or timeout
    Network,
    /// Transaction failure
    DeploymentFailure,
    /// Prediction and reality diverged
    NonceDrift,
    /// Capability target without code
    NotAContract,
    /// Stale artifacts or unusable compiler output
    Artifact,
    /// Stopped on request
    Cancelled,
}

impl PredeployError {
    /// Returns the classification of this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Io { .. } => ErrorKind::Io,
            Self::Network { .. } | Self::Timeout { .. } => ErrorKind::Network,
            Self::DeploymentFailure { .. } => ErrorKind::DeploymentFailure,
            Self::NonceDrift { .. } | Self::UnexpectedNonce { .. } => ErrorKind::NonceDrift,
            Self::NotAContract { .. } => ErrorKind::NotAContract,
            Self::StaleArtifact { .. } | Self::Compile { .. } => ErrorKind::Artifact,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn network(step: impl Into<String>, source: LedgerError) -> Self {
        Self::Network { step: step.into(), source }
    }
}

/// Result type for the predeploy pipeline.
pub type Result<T> = std::result::Result<T, PredeployError>;
