use std::fmt;

use alloy_network::{ReceiptResponse, TransactionBuilder};
use alloy_primitives::{Address, Bytes, TxHash};
use alloy_provider::{DynProvider, Provider, ProviderBuilder};
use alloy_rpc_types_eth::TransactionRequest;
use tokio::sync::OnceCell;
use tracing::{debug, trace};

use super::{Ledger, LedgerError, TxReceipt, TxRequest};
use crate::{DeployerIdentity, PredeployError};

/// A [`Ledger`] backed by a JSON-RPC endpoint.
///
/// Transactions are signed locally and sent raw as legacy transactions priced at the node's
/// current gas price, which every development node accepts.
#[derive(Clone)]
pub struct RpcLedger {
    provider: DynProvider,
    chain_id: OnceCell<u64>,
}

impl fmt::Debug for RpcLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcLedger").field("chain_id", &self.chain_id.get()).finish_non_exhaustive()
    }
}

impl RpcLedger {
    /// Wraps an existing provider.
    pub fn new(provider: DynProvider) -> Self {
        Self { provider, chain_id: OnceCell::new() }
    }

    /// Connects to an HTTP endpoint.
    pub fn connect_http(url: &str) -> crate::Result<Self> {
        let url = url
            .parse()
            .map_err(|e| PredeployError::InvalidInput(format!("Invalid RPC URL '{url}': {e}")))?;
        let provider = ProviderBuilder::new().disable_recommended_fillers().connect_http(url);
        Ok(Self::new(provider.erased()))
    }

    /// The underlying provider.
    pub const fn provider(&self) -> &DynProvider {
        &self.provider
    }

    async fn chain_id(&self) -> Result<u64, LedgerError> {
        self.chain_id
            .get_or_try_init(|| async { Ok::<_, LedgerError>(self.provider.get_chain_id().await?) })
            .await
            .copied()
    }
}

impl Ledger for RpcLedger {
    async fn transaction_count(&self, address: Address) -> Result<u64, LedgerError> {
        let count = self.provider.get_transaction_count(address).pending().await?;
        trace!(%address, count, "Fetched transaction count");
        Ok(count)
    }

    async fn code_at(&self, address: Address) -> Result<Bytes, LedgerError> {
        let code = self.provider.get_code_at(address).await?;
        trace!(%address, len = code.len(), "Fetched code");
        Ok(code)
    }

    async fn send_transaction(
        &self,
        from: &DeployerIdentity,
        request: TxRequest,
    ) -> Result<TxHash, LedgerError> {
        let chain_id = self.chain_id().await?;
        let gas_price = self.provider.get_gas_price().await?;

        let mut tx = TransactionRequest::default()
            .with_from(from.address())
            .with_chain_id(chain_id)
            .with_nonce(request.nonce)
            .with_gas_price(gas_price)
            .with_input(request.input);
        tx = match request.to {
            Some(to) => tx.with_to(to),
            None => tx.into_create(),
        };
        let gas_limit = match request.gas_limit {
            Some(gas_limit) => gas_limit,
            None => self.provider.estimate_gas(tx.clone()).await?,
        };
        let tx = tx.with_gas_limit(gas_limit);

        let envelope =
            tx.build(&from.wallet()).await.map_err(|e| LedgerError::Signing(e.to_string()))?;
        let pending = self.provider.send_tx_envelope(envelope).await?;
        let tx_hash = *pending.tx_hash();
        debug!(
            from = %from.address(),
            nonce = request.nonce,
            gas_limit,
            %tx_hash,
            "Transaction submitted"
        );
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>, LedgerError> {
        let receipt = self.provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|receipt| TxReceipt {
            tx_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            success: receipt.status(),
            contract_address: receipt.contract_address(),
            gas_used: receipt.gas_used(),
        }))
    }
}
