//! The end-to-end bootstrap: predict, materialize, compile, deploy, verify, grant.

use std::collections::BTreeMap;

use alloy_primitives::Address;
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    plan::{DeployerAccount, Stage},
    ArtifactStore, CancelSignal, CapabilityOutcome, CapabilityProvisioner, Compiler,
    DeploymentPlan, DeploymentRecord, DeploymentSequencer, Halted, IdentitySet, Ledger,
    Materialized, Materializer, PlanDefinition, PredeployError, Result, RetryPolicy,
};

/// Settings shared by every step of a run. Built once by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Bounds for network reads and confirmations
    pub retry: RetryPolicy,
}

/// The outcome of one capability grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantRecord {
    /// Component hosting the entry point
    pub target: String,
    /// Its address
    pub contract: Address,
    /// The authorized account
    pub grantee: Address,
    /// What happened
    #[serde(flatten)]
    pub outcome: CapabilityOutcome,
}

/// Everything a run did, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeploymentReport {
    /// One record per submitted deployment
    pub records: Vec<DeploymentRecord>,
    /// One record per issued grant
    pub grants: Vec<GrantRecord>,
}

impl DeploymentReport {
    /// Whether every issued grant succeeded.
    pub fn all_granted(&self) -> bool {
        self.grants.iter().all(|grant| grant.outcome.is_granted())
    }
}

/// A run that stopped on a fatal error, with what it did before.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct PipelineFailure {
    /// Steps completed before the failure, the failing deployment last
    pub report: DeploymentReport,
    /// The fatal error
    #[source]
    pub error: PredeployError,
}

impl From<PredeployError> for PipelineFailure {
    fn from(error: PredeployError) -> Self {
        Self { report: DeploymentReport::default(), error }
    }
}

/// Drives a [`DeploymentPlan`] against a ledger.
#[derive(Debug)]
pub struct Pipeline<L, S, C> {
    config: PipelineConfig,
    ledger: L,
    materializer: Materializer<S>,
    compiler: C,
    cancel: CancelSignal,
}

impl<L: Ledger, S: ArtifactStore, C: Compiler> Pipeline<L, S, C> {
    /// Creates a pipeline.
    pub fn new(config: PipelineConfig, ledger: L, store: S, compiler: C) -> Self {
        Self {
            config,
            ledger,
            materializer: Materializer::new(store),
            compiler,
            cancel: CancelSignal::never(),
        }
    }

    /// Stops before the next transaction once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// The ledger.
    pub const fn ledger(&self) -> &L {
        &self.ledger
    }

    /// The materializer.
    pub const fn materializer(&self) -> &Materializer<S> {
        &self.materializer
    }

    /// Predicts and deploys `definition`.
    ///
    /// The artifacts are rewritten only when the compiler rebuilds from them. Otherwise the
    /// existing ones must already match the live predictions, or the run stops with
    /// [`PredeployError::StaleArtifact`] before anything is sent.
    pub async fn run(
        &self,
        definition: &PlanDefinition,
        identities: &IdentitySet,
    ) -> std::result::Result<DeploymentReport, PipelineFailure> {
        let plan = self.plan(definition, identities).await?;
        if self.compiler.rebuilds() {
            self.materialize(&plan)?;
        } else {
            info!("Compiler output is prebuilt, checking existing artifacts");
        }
        self.deploy(&plan, identities).await
    }

    /// Builds the plan from the identities' live transaction counts.
    pub async fn plan(
        &self,
        definition: &PlanDefinition,
        identities: &IdentitySet,
    ) -> Result<DeploymentPlan> {
        let mut accounts = BTreeMap::new();
        for slot in definition.identity_slots() {
            let address = identities.get(slot)?.address();
            let base_nonce = self
                .config
                .retry
                .read(&format!("nonce read of identity {slot}"), || {
                    self.ledger.transaction_count(address)
                })
                .await?;
            accounts.insert(slot, DeployerAccount { address, base_nonce });
        }
        let plan = DeploymentPlan::build(definition, &accounts)?;
        for component in plan.components() {
            info!(
                component = %component.name,
                deployer = %component.predicted.deployer,
                nonce = component.expected_nonce(),
                address = %component.predicted.address,
                "Predicted address"
            );
        }
        Ok(plan)
    }

    /// Writes the artifacts of every component. The first error aborts.
    pub fn materialize(&self, plan: &DeploymentPlan) -> Result<Vec<Materialized>> {
        plan.components()
            .iter()
            .map(|component| {
                self.materializer.materialize(
                    &component.name,
                    &component.names,
                    &component.predicted,
                )
            })
            .collect()
    }

    /// Fails if any artifact no longer matches the plan.
    pub fn check_artifacts(&self, plan: &DeploymentPlan) -> Result<()> {
        plan.components().iter().try_for_each(|component| {
            self.materializer.check(&component.name, &component.names, &component.predicted)
        })
    }

    /// Compiles against the materialized artifacts, then runs every stage in order.
    ///
    /// Refuses to start when an artifact is stale or a deployer's live nonce differs from the
    /// plan. Stops at the first fatal error; a denied grant is recorded and the run goes on.
    pub async fn deploy(
        &self,
        plan: &DeploymentPlan,
        identities: &IdentitySet,
    ) -> std::result::Result<DeploymentReport, PipelineFailure> {
        self.check_artifacts(plan)?;
        self.compiler.prepare()?;

        let mut report = DeploymentReport::default();
        for (index, stage) in plan.stages().iter().enumerate() {
            if let Err(error) = self.run_stage(plan, index, stage, identities, &mut report).await {
                return Err(PipelineFailure { report, error });
            }
        }
        info!(
            deployed = report.records.len(),
            grants = report.grants.len(),
            all_granted = report.all_granted(),
            "Pipeline complete"
        );
        Ok(report)
    }

    #[instrument(
        skip_all,
        fields(stage = index, identity = stage.identity, deployer = %stage.deployer)
    )]
    async fn run_stage(
        &self,
        plan: &DeploymentPlan,
        index: usize,
        stage: &Stage,
        identities: &IdentitySet,
        report: &mut DeploymentReport,
    ) -> Result<()> {
        let identity = identities.get(stage.identity)?;
        if identity.address() != stage.deployer {
            return Err(PredeployError::InvalidInput(format!(
                "Identity {} is {}, but the plan was built for {}",
                stage.identity,
                identity.address(),
                stage.deployer
            )));
        }
        self.preflight(stage).await?;

        let sequencer = DeploymentSequencer::new(&self.ledger, &self.compiler, self.config.retry)
            .with_cancel(self.cancel.clone());
        match sequencer.run(identity, plan.stage_components(stage)).await {
            Ok(records) => report.records.extend(records),
            Err(Halted { records, error }) => {
                report.records.extend(records);
                return Err(error);
            }
        }

        let provisioner = CapabilityProvisioner::new(&self.ledger, self.config.retry)
            .with_cancel(self.cancel.clone());
        for grant in &stage.grants {
            let target = plan.component(grant.target);
            let outcome = provisioner
                .grant_capability(identity, target.predicted.address, grant.grantee)
                .await?;
            report.grants.push(GrantRecord {
                target: target.name.clone(),
                contract: target.predicted.address,
                grantee: grant.grantee,
                outcome,
            });
        }
        Ok(())
    }

    /// Checks that the stage's deployer is exactly where the plan expects it.
    async fn preflight(&self, stage: &Stage) -> Result<()> {
        if stage.transaction_count() == 0 {
            return Ok(());
        }
        let live = self
            .config
            .retry
            .read("pre-flight nonce check", || self.ledger.transaction_count(stage.deployer))
            .await?;
        if live != stage.base_nonce {
            return Err(PredeployError::UnexpectedNonce {
                deployer: stage.deployer,
                expected: stage.base_nonce,
                actual: live,
            });
        }
        Ok(())
    }
}
