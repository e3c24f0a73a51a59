use std::{path::PathBuf, time::Duration};

use clap::Parser;
use fhevm_predeploy::{plan::fhevm_plan, IdentitySet, PlanDefinition, RetryPolicy};

use super::{DeployError, Result};

/// JSON-RPC endpoint of the target network.
#[derive(Parser, Debug, Clone)]
pub struct NetworkArgs {
    /// RPC URL of the node to deploy to
    #[arg(long = "rpc", env = "NETWORK_URL", default_value = "http://localhost:8545")]
    pub rpc: String,
}

/// Key material of the deployer identities.
///
/// Slot `n` of a plan is the `n`-th private key, or account `n` of the mnemonic.
#[derive(Parser, Debug, Clone, Default)]
pub struct IdentityArgs {
    /// Deployer private keys, comma-separated, in slot order
    #[arg(
        long = "private-key",
        env = "PRIVATE_KEY",
        value_delimiter = ',',
        hide_env_values = true
    )]
    pub private_keys: Vec<String>,

    /// BIP-39 seed phrase; slot `n` uses `m/44'/60'/0'/0/n`
    #[arg(
        long = "mnemonic",
        env = "MNEMONIC",
        hide_env_values = true,
        conflicts_with = "private_keys"
    )]
    pub mnemonic: Option<String>,
}

impl IdentityArgs {
    /// Loads the identities of `slots`.
    pub fn load(&self, slots: impl IntoIterator<Item = u32>) -> Result<IdentitySet> {
        if !self.private_keys.is_empty() {
            return Ok(IdentitySet::from_private_keys(&self.private_keys)?);
        }
        match &self.mnemonic {
            Some(phrase) => Ok(IdentitySet::from_mnemonic(phrase, slots)?),
            None => Err(DeployError::InvalidInput(
                "No deployer key: pass --private-key or --mnemonic (or set PRIVATE_KEY / MNEMONIC)"
                    .to_string(),
            )),
        }
    }
}

/// Which plan to run.
#[derive(Parser, Debug, Clone, Default)]
pub struct PlanArgs {
    /// JSON plan file; the built-in fhEVM plan when omitted
    #[arg(long = "plan")]
    pub plan: Option<PathBuf>,
}

impl PlanArgs {
    /// Loads the plan definition.
    pub fn load(&self) -> Result<PlanDefinition> {
        match &self.plan {
            Some(path) => Ok(PlanDefinition::from_file(path)?),
            None => Ok(fhevm_plan()),
        }
    }
}

/// Root the artifacts are materialized under.
#[derive(Parser, Debug, Clone)]
pub struct OutputArgs {
    /// Directory receiving the `.env.*` and `*Address.sol` files
    #[arg(long = "output-root", default_value = ".")]
    pub output_root: PathBuf,
}

/// Bounds for network waits.
#[derive(Parser, Debug, Clone)]
pub struct RetryArgs {
    /// Attempts per network read
    #[arg(long = "retry.max-attempts", default_value = "5")]
    pub max_attempts: u32,

    /// First retry delay, in milliseconds
    #[arg(long = "retry.initial-backoff-ms", default_value = "500")]
    pub initial_backoff_ms: u64,

    /// Largest retry delay, in milliseconds
    #[arg(long = "retry.max-backoff-ms", default_value = "8000")]
    pub max_backoff_ms: u64,

    /// How long to wait for a transaction to be included, in seconds
    #[arg(long = "confirmation-timeout", default_value = "120")]
    pub confirmation_timeout_secs: u64,

    /// Delay between receipt polls, in milliseconds
    #[arg(long = "poll-interval-ms", default_value = "500")]
    pub poll_interval_ms: u64,
}

impl RetryArgs {
    /// The policy these arguments describe.
    pub fn policy(&self) -> Result<RetryPolicy> {
        if self.max_attempts == 0 {
            return Err(DeployError::InvalidInput(
                "--retry.max-attempts must be at least 1".to_string(),
            ));
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            max_backoff: Duration::from_millis(self.max_backoff_ms),
            confirmation_timeout: Duration::from_secs(self.confirmation_timeout_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        })
    }
}

/// Parses `slot=nonce`.
pub fn parse_slot_nonce(s: &str) -> std::result::Result<(u32, u64), String> {
    let (slot, nonce) = s.split_once('=').ok_or_else(|| format!("expected SLOT=NONCE, got '{s}'"))?;
    let slot = slot.trim().parse::<u32>().map_err(|e| format!("invalid slot '{slot}': {e}"))?;
    let nonce = fhevm_predeploy::parse_nonce(nonce).map_err(|e| e.to_string())?;
    Ok((slot, nonce))
}
