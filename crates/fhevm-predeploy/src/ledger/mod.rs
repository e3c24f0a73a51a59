//! The ledger the pipeline deploys to.
//!
//! [`Ledger`] is the seam between the orchestration logic and the network: four calls, all of
//! them either idempotent reads or a single submission. [`RpcLedger`] talks JSON-RPC through an
//! alloy provider; tests use the in-memory ledger from `test_utils`.

mod rpc;
pub use rpc::*;

use std::future::Future;

use alloy_primitives::{Address, Bytes, TxHash};
use alloy_transport::TransportError;

use crate::DeployerIdentity;

/// A transaction to sign and submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    /// Call target; `None` creates a contract
    pub to: Option<Address>,
    /// Creation code or calldata
    pub input: Bytes,
    /// The nonce the transaction must consume
    pub nonce: u64,
    /// Gas limit; estimated by the ledger when unset
    pub gas_limit: Option<u64>,
}

impl TxRequest {
    /// A contract creation.
    pub const fn create(input: Bytes, nonce: u64) -> Self {
        Self { to: None, input, nonce, gas_limit: None }
    }

    /// A call to `to`.
    pub const fn call(to: Address, input: Bytes, nonce: u64) -> Self {
        Self { to: Some(to), input, nonce, gas_limit: None }
    }

    /// Sets a fixed gas limit.
    pub const fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }
}

/// The parts of a receipt the pipeline looks at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    /// The transaction hash
    pub tx_hash: TxHash,
    /// The including block
    pub block_number: Option<u64>,
    /// Whether execution succeeded
    pub success: bool,
    /// The created contract, for creations
    pub contract_address: Option<Address>,
    /// Gas consumed
    pub gas_used: u64,
}

/// Errors returned by a [`Ledger`].
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// The node could not be reached or answered garbage.
    #[error("Transport error: {0}")]
    Transport(String),
    /// The node answered with an error, e.g. a nonce or gas rejection.
    #[error("Rejected by node: {0}")]
    Rejected(String),
    /// The transaction could not be built or signed.
    #[error("Failed to sign transaction: {0}")]
    Signing(String),
}

impl LedgerError {
    /// Whether repeating the same read may succeed.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<TransportError> for LedgerError {
    fn from(err: TransportError) -> Self {
        match err.as_error_resp() {
            Some(payload) => Self::Rejected(format!("{} (code {})", payload.message, payload.code)),
            None => Self::Transport(err.to_string()),
        }
    }
}

/// Access to a ledger network.
///
/// Implementations must be safe to call concurrently, but the pipeline never issues two
/// nonce-consuming calls for one identity at the same time.
pub trait Ledger: Send + Sync {
    /// The pending transaction count of `address`, i.e. the nonce its next transaction uses.
    fn transaction_count(
        &self,
        address: Address,
    ) -> impl Future<Output = Result<u64, LedgerError>> + Send;

    /// The code deployed at `address`; empty for accounts without code.
    fn code_at(&self, address: Address) -> impl Future<Output = Result<Bytes, LedgerError>> + Send;

    /// Signs `request` with `from`'s key and submits it once.
    fn send_transaction(
        &self,
        from: &DeployerIdentity,
        request: TxRequest,
    ) -> impl Future<Output = Result<TxHash, LedgerError>> + Send;

    /// The receipt of `tx_hash`, or `None` while it is not included.
    fn receipt(
        &self,
        tx_hash: TxHash,
    ) -> impl Future<Output = Result<Option<TxReceipt>, LedgerError>> + Send;
}
