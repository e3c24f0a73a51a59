//! Deploys the components of one identity strictly in nonce order.

use alloy_primitives::{Address, Bytes, TxHash};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::{
    verify, ComponentSpec, Compiler, DeployerIdentity, Ledger, LedgerError, PredeployError,
    RetryPolicy, TxRequest,
};

/// Lifecycle of a [`DeploymentRecord`].
///
/// A record is created `Pending` when its transaction is submitted and moves to exactly one of
/// the other states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, derive_more::Display)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Submitted, not yet verified
    Pending,
    /// Deployed at the predicted address
    Confirmed,
    /// Deployed somewhere else than predicted
    Mismatched,
    /// Not deployed
    Failed,
}

/// The outcome of one deployment step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeploymentRecord {
    /// Logical component name
    pub component: String,
    /// The nonce the deployment transaction consumed
    pub nonce: u64,
    /// The predicted address
    pub predicted: Address,
    /// The address reported by the receipt
    pub actual: Option<Address>,
    /// The deployment transaction, once accepted by the node
    pub tx_hash: Option<TxHash>,
    /// Current status
    pub status: DeploymentStatus,
    /// Why the step failed or mismatched
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl DeploymentRecord {
    fn pending(component: &ComponentSpec, nonce: u64, tx_hash: Option<TxHash>) -> Self {
        Self {
            component: component.name.clone(),
            nonce,
            predicted: component.predicted.address,
            actual: None,
            tx_hash,
            status: DeploymentStatus::Pending,
            failure: None,
        }
    }

    fn fail(mut self, error: &PredeployError) -> Self {
        self.status = DeploymentStatus::Failed;
        self.failure = Some(error.to_string());
        self
    }
}

/// A sequencing run that stopped early.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct Halted {
    /// Records of every step that was submitted, the failing one last
    pub records: Vec<DeploymentRecord>,
    /// Why the run stopped
    #[source]
    pub error: PredeployError,
}

impl Halted {
    fn new(records: Vec<DeploymentRecord>, error: PredeployError) -> Self {
        error!(%error, completed = records.len(), "Sequencing halted");
        Self { records, error }
    }
}

/// Stops a run before its next step.
///
/// Cancellation never rolls back a submitted transaction; it only prevents new ones.
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    /// A signal and the sender that triggers it.
    pub fn new() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self(rx))
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self::new().1
    }

    /// Whether cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    pub(crate) fn check(&self, next_step: &str) -> crate::Result<()> {
        if self.is_cancelled() {
            warn!(next_step, "Cancellation requested");
            return Err(PredeployError::Cancelled { component: next_step.to_string() });
        }
        Ok(())
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

/// Submits deployment transactions one at a time and verifies each before the next.
#[derive(Debug)]
pub struct DeploymentSequencer<'a, L, C> {
    ledger: &'a L,
    compiler: &'a C,
    retry: RetryPolicy,
    cancel: CancelSignal,
}

impl<'a, L: Ledger, C: Compiler> DeploymentSequencer<'a, L, C> {
    /// Creates a sequencer.
    pub fn new(ledger: &'a L, compiler: &'a C, retry: RetryPolicy) -> Self {
        Self { ledger, compiler, retry, cancel: CancelSignal::never() }
    }

    /// Stops before the next submission once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Deploys `components` from `identity`, in order.
    ///
    /// Every transaction uses the identity's live pending nonce. When nothing else sends from
    /// the identity that is the nonce each prediction assumed; when something does, the
    /// deployment lands elsewhere and the verifier stops the run at that step.
    ///
    /// Every deployment input is built before the first submission, so a missing compiler
    /// artifact or a bad constructor argument aborts the run without touching the chain.
    pub async fn run(
        &self,
        identity: &DeployerIdentity,
        components: &[ComponentSpec],
    ) -> Result<Vec<DeploymentRecord>, Halted> {
        let inputs =
            self.deployment_inputs(identity, components).map_err(|e| Halted::new(Vec::new(), e))?;

        let mut records = Vec::with_capacity(components.len());
        for (component, input) in components.iter().zip(inputs) {
            if let Err(error) = self.cancel.check(&component.name) {
                return Err(Halted::new(records, error));
            }
            let record = match self.deploy(identity, component, input).await {
                Ok(record) => record,
                Err((record, error)) => {
                    records.extend(record);
                    return Err(Halted::new(records, error));
                }
            };
            records.push(record);
        }
        Ok(records)
    }

    fn deployment_inputs(
        &self,
        identity: &DeployerIdentity,
        components: &[ComponentSpec],
    ) -> crate::Result<Vec<Bytes>> {
        components
            .iter()
            .map(|component| {
                if component.predicted.deployer != identity.address() {
                    return Err(PredeployError::InvalidInput(format!(
                        "{} is predicted for deployer {}, not {}",
                        component.name,
                        component.predicted.deployer,
                        identity.address()
                    )));
                }
                self.compiler.compile(component)?.deployment_input(&component.name, &component.args)
            })
            .collect()
    }

    /// Runs one step. On failure, returns the record of the step (if it got as far as a
    /// submission attempt) together with the error.
    async fn deploy(
        &self,
        identity: &DeployerIdentity,
        component: &ComponentSpec,
        input: Bytes,
    ) -> Result<DeploymentRecord, (Option<DeploymentRecord>, PredeployError)> {
        let step = format!("deployment of {}", component.name);
        let nonce = self
            .retry
            .read(&step, || self.ledger.transaction_count(identity.address()))
            .await
            .map_err(|e| (None, e))?;
        if nonce != component.expected_nonce() {
            warn!(
                component = %component.name,
                expected = component.expected_nonce(),
                nonce,
                "Deployer nonce moved since prediction"
            );
        }

        let request = TxRequest::create(input, nonce);
        let tx_hash = match self.ledger.send_transaction(identity, request).await {
            Ok(tx_hash) => tx_hash,
            Err(err) => {
                let error = submission_error(&component.name, err);
                let record = DeploymentRecord::pending(component, nonce, None).fail(&error);
                return Err((Some(record), error));
            }
        };
        info!(
            component = %component.name,
            nonce,
            %tx_hash,
            predicted = %component.predicted.address,
            "Deployment submitted"
        );
        let mut record = DeploymentRecord::pending(component, nonce, Some(tx_hash));

        let receipt = match self.retry.await_receipt(self.ledger, &step, tx_hash).await {
            Ok(receipt) => receipt,
            Err(error) => return Err((Some(record.fail(&error)), error)),
        };
        if !receipt.success {
            let error = PredeployError::DeploymentFailure {
                component: component.name.clone(),
                reason: "deployment transaction reverted".to_string(),
                tx_hash: Some(tx_hash),
            };
            return Err((Some(record.fail(&error)), error));
        }
        let Some(actual) = receipt.contract_address else {
            let error = PredeployError::DeploymentFailure {
                component: component.name.clone(),
                reason: "receipt carries no contract address".to_string(),
                tx_hash: Some(tx_hash),
            };
            return Err((Some(record.fail(&error)), error));
        };

        record.actual = Some(actual);
        match verify(&mut record, component.expected_nonce()) {
            Ok(()) => {
                info!(
                    component = %component.name,
                    address = %actual,
                    block = ?receipt.block_number,
                    "Deployment confirmed"
                );
                Ok(record)
            }
            Err(error) => Err((Some(record), error)),
        }
    }
}

/// Maps a failed submission to the error that halts the run.
pub(crate) fn submission_error(component: &str, err: LedgerError) -> PredeployError {
    match err {
        LedgerError::Transport(_) => {
            PredeployError::network(format!("submission of {component}"), err)
        }
        LedgerError::Rejected(reason) | LedgerError::Signing(reason) => {
            PredeployError::DeploymentFailure {
                component: component.to_string(),
                reason,
                tx_hash: None,
            }
        }
    }
}
