use std::{collections::BTreeMap, path::PathBuf};

use alloy_primitives::Address;
use clap::Parser;
use fhevm_predeploy::{
    plan::DeployerAccount, DeploymentPlan, FsArtifactStore, IdentitySet, Ledger, Materializer,
    PlanDefinition, RetryPolicy, RpcLedger,
};
use serde::Serialize;
use tracing::info;

use crate::common::{
    parse_slot_nonce, print_json, DeployError, IdentityArgs, OutputArgs, PlanArgs, Result,
    RetryArgs,
};

/// Write the predicted addresses without deploying anything
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Plan selection
    #[command(flatten)]
    pub plan_args: PlanArgs,

    /// Deployer keys
    #[command(flatten)]
    pub identity_args: IdentityArgs,

    /// Output location
    #[command(flatten)]
    pub output_args: OutputArgs,

    /// Retry configuration for nonce reads
    #[command(flatten)]
    pub retry_args: RetryArgs,

    /// Starting nonce of a deployer slot, as SLOT=NONCE; repeat per slot
    #[arg(long = "base-nonce", value_parser = parse_slot_nonce)]
    pub base_nonces: Vec<(u32, u64)>,

    /// Read missing base nonces from this node
    #[arg(long = "rpc", env = "NETWORK_URL")]
    pub rpc: Option<String>,
}

/// One materialized component, as printed.
#[derive(Debug, Serialize)]
pub struct MaterializedEntry {
    /// Component name
    pub component: String,
    /// The deployer
    pub deployer: Address,
    /// Nonce the prediction assumes
    pub nonce: u64,
    /// Predicted address
    pub address: Address,
    /// Written config artifact
    pub config: PathBuf,
    /// Written Solidity constant
    pub source: PathBuf,
}

impl Cmd {
    /// Execute the materialize command
    pub async fn run(&self) -> Result<()> {
        let entries = self.materialize().await?;
        print_json(&entries)
    }

    /// Builds the plan and writes its artifacts.
    pub async fn materialize(&self) -> Result<Vec<MaterializedEntry>> {
        let definition = self.plan_args.load()?;
        let identities = self.identity_args.load(definition.identity_slots())?;
        let accounts = self.accounts(&definition, &identities).await?;
        let plan = DeploymentPlan::build(&definition, &accounts)?;

        let materializer = Materializer::new(FsArtifactStore::new(&self.output_args.output_root));
        let mut entries = Vec::with_capacity(plan.components().len());
        for component in plan.components() {
            let written =
                materializer.materialize(&component.name, &component.names, &component.predicted)?;
            info!(
                component = %component.name,
                address = %component.predicted.address,
                "Materialized"
            );
            entries.push(MaterializedEntry {
                component: component.name.clone(),
                deployer: component.predicted.deployer,
                nonce: component.predicted.nonce,
                address: component.predicted.address,
                config: written.config_path().clone(),
                source: written.source_path().clone(),
            });
        }
        Ok(entries)
    }

    async fn accounts(
        &self,
        definition: &PlanDefinition,
        identities: &IdentitySet,
    ) -> Result<BTreeMap<u32, DeployerAccount>> {
        let given: BTreeMap<u32, u64> = self.base_nonces.iter().copied().collect();
        let ledger = self.rpc.as_deref().map(RpcLedger::connect_http).transpose()?;
        let retry: RetryPolicy = self.retry_args.policy()?;

        let mut accounts = BTreeMap::new();
        for slot in definition.identity_slots() {
            let address = identities.get(slot)?.address();
            let base_nonce = match (given.get(&slot), &ledger) {
                (Some(nonce), _) => *nonce,
                (None, Some(ledger)) => {
                    retry
                        .read(&format!("nonce read of identity {slot}"), || {
                            ledger.transaction_count(address)
                        })
                        .await?
                }
                (None, None) => {
                    return Err(DeployError::InvalidInput(format!(
                        "No base nonce for identity {slot}: pass --base-nonce {slot}=N or --rpc"
                    )))
                }
            };
            accounts.insert(slot, DeployerAccount { address, base_nonce });
        }
        Ok(accounts)
    }
}
