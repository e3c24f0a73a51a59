use alloy_primitives::Address;
use clap::Parser;
use fhevm_predeploy::{CapabilityProvisioner, IdentitySet, RpcLedger};
use serde::Serialize;

use crate::common::{print_json, DeployError, IdentityArgs, NetworkArgs, Result, RetryArgs};

/// Authorize a relayer on a deployed gateway contract
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Deployer keys
    #[command(flatten)]
    pub identity_args: IdentityArgs,

    /// Node connection
    #[command(flatten)]
    pub network_args: NetworkArgs,

    /// Network retry and confirmation bounds
    #[command(flatten)]
    pub retry_args: RetryArgs,

    /// Identity slot that signs the grant
    #[arg(long = "identity", default_value = "0")]
    pub identity: u32,

    /// Contract exposing `addRelayer`
    #[arg(long = "target")]
    pub target: Address,

    /// Account to authorize; the signing identity when omitted
    #[arg(long = "grantee")]
    pub grantee: Option<Address>,
}

#[derive(Debug, Serialize)]
struct GrantOutput<T> {
    contract: Address,
    grantee: Address,
    #[serde(flatten)]
    outcome: T,
}

impl Cmd {
    /// Execute the grant command
    pub async fn run(&self) -> Result<()> {
        let identities: IdentitySet = self.identity_args.load([self.identity])?;
        let identity = identities.get(self.identity)?;
        let grantee = self.grantee.unwrap_or_else(|| identity.address());
        let ledger = RpcLedger::connect_http(&self.network_args.rpc)?;

        let outcome = CapabilityProvisioner::new(&ledger, self.retry_args.policy()?)
            .grant_capability(identity, self.target, grantee)
            .await?;
        print_json(&GrantOutput { contract: self.target, grantee, outcome })?;
        if outcome.is_granted() {
            Ok(())
        } else {
            Err(DeployError::CapabilityDenied {
                target: self.target.to_string(),
                grantee: grantee.to_string(),
            })
        }
    }
}
