//! Grants operational capabilities once the contract set is live.

use alloy_primitives::{Address, TxHash};
use alloy_sol_types::{sol, SolCall};
use serde::Serialize;
use tracing::{info, warn};

use crate::{
    sequencer::submission_error, CancelSignal, DeployerIdentity, Ledger, PredeployError, Result,
    RetryPolicy, TxRequest,
};

sol! {
    /// Relayer management of the gateway contract.
    interface IGatewayContract {
        function addRelayer(address relayer) external;
    }
}

/// Gas limit of an `addRelayer` call; a single storage write plus an event.
pub const ADD_RELAYER_GAS_LIMIT: u64 = 100_000;

/// Result of a capability grant that reached the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CapabilityOutcome {
    /// The grant transaction succeeded.
    Granted {
        /// The grant transaction
        tx_hash: TxHash,
    },
    /// The grant transaction was included but reverted, e.g. the sender is not the owner.
    Denied {
        /// The grant transaction
        tx_hash: TxHash,
    },
}

impl CapabilityOutcome {
    /// Whether the capability was granted.
    pub const fn is_granted(&self) -> bool {
        matches!(self, Self::Granted { .. })
    }
}

/// Issues `addRelayer` calls after probing the target.
#[derive(Debug)]
pub struct CapabilityProvisioner<'a, L> {
    ledger: &'a L,
    retry: RetryPolicy,
    cancel: CancelSignal,
}

impl<'a, L: Ledger> CapabilityProvisioner<'a, L> {
    /// Creates a provisioner.
    pub fn new(ledger: &'a L, retry: RetryPolicy) -> Self {
        Self { ledger, retry, cancel: CancelSignal::never() }
    }

    /// Refuses to submit once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Authorizes `grantee` as relayer on `target`, signing with `identity`.
    ///
    /// Fails with [`PredeployError::NotAContract`] without sending anything when `target` has
    /// no code. A reverted grant is returned as [`CapabilityOutcome::Denied`] and never retried.
    pub async fn grant_capability(
        &self,
        identity: &DeployerIdentity,
        target: Address,
        grantee: Address,
    ) -> Result<CapabilityOutcome> {
        let step = format!("capability grant on {target}");
        let code = self.retry.read(&step, || self.ledger.code_at(target)).await?;
        if code.is_empty() {
            warn!(%target, "Capability target has no code");
            return Err(PredeployError::NotAContract { address: target });
        }

        self.cancel.check(&step)?;
        let nonce =
            self.retry.read(&step, || self.ledger.transaction_count(identity.address())).await?;
        let input = IGatewayContract::addRelayerCall { relayer: grantee }.abi_encode();
        let request =
            TxRequest::call(target, input.into(), nonce).with_gas_limit(ADD_RELAYER_GAS_LIMIT);
        let tx_hash = self
            .ledger
            .send_transaction(identity, request)
            .await
            .map_err(|err| submission_error(&step, err))?;
        info!(%target, %grantee, nonce, %tx_hash, "Capability grant submitted");

        let receipt = self.retry.await_receipt(self.ledger, &step, tx_hash).await?;
        if receipt.success {
            info!(%target, %grantee, "Capability granted");
            Ok(CapabilityOutcome::Granted { tx_hash })
        } else {
            warn!(%target, %grantee, %tx_hash, "Capability grant reverted");
            Ok(CapabilityOutcome::Denied { tx_hash })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{gateway_code, hardhat_identities, MockLedger};
    use alloy_primitives::Bytes;

    #[tokio::test(start_paused = true)]
    async fn test_empty_code_is_not_a_contract() {
        let ledger = MockLedger::default();
        let identity = hardhat_identities().get(0).unwrap().clone();
        let target = Address::repeat_byte(0x11);

        let err = CapabilityProvisioner::new(&ledger, RetryPolicy::default())
            .grant_capability(&identity, target, identity.address())
            .await
            .unwrap_err();
        assert!(matches!(err, PredeployError::NotAContract { address } if address == target));
        assert!(ledger.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_grant_and_denial() {
        let ledger = MockLedger::default();
        let identity = hardhat_identities().get(1).unwrap().clone();
        let gateway = Address::repeat_byte(0x22);
        let other = Address::repeat_byte(0x33);
        ledger.set_code(gateway, gateway_code());
        ledger.set_code(other, Bytes::from_static(&[0x60, 0x00]));
        let provisioner = CapabilityProvisioner::new(&ledger, RetryPolicy::default());

        let granted =
            provisioner.grant_capability(&identity, gateway, identity.address()).await.unwrap();
        assert!(granted.is_granted());
        let sent = ledger.sent();
        assert_eq!(sent[0].request.to, Some(gateway));
        assert_eq!(sent[0].request.gas_limit, Some(ADD_RELAYER_GAS_LIMIT));
        assert_eq!(
            IGatewayContract::addRelayerCall::abi_decode(&sent[0].request.input).unwrap().relayer,
            identity.address()
        );

        let denied =
            provisioner.grant_capability(&identity, other, identity.address()).await.unwrap();
        assert!(matches!(denied, CapabilityOutcome::Denied { .. }));
        // Denials are not retried.
        assert_eq!(ledger.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_retries_transient_errors() {
        let ledger = MockLedger::default();
        let identity = hardhat_identities().get(1).unwrap().clone();
        let gateway = Address::repeat_byte(0x22);
        ledger.set_code(gateway, gateway_code());
        ledger.fail_reads(2);

        let outcome = CapabilityProvisioner::new(&ledger, RetryPolicy::default())
            .grant_capability(&identity, gateway, identity.address())
            .await
            .unwrap();
        assert!(outcome.is_granted());
    }
}
