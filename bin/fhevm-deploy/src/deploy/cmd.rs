use std::path::PathBuf;

use clap::Parser;
use fhevm_predeploy::{
    ArtifactDirCompiler, CancelSignal, CompileCommand, DeploymentReport, FsArtifactStore,
    Pipeline, PipelineConfig, RpcLedger,
};
use tokio::sync::watch;
use tracing::warn;

use crate::common::{
    print_json, DeployError, IdentityArgs, NetworkArgs, OutputArgs, PlanArgs, Result, RetryArgs,
};

/// Predict and deploy a plan
///
/// With `--compile-cmd` the address artifacts are rewritten and the contracts rebuilt first.
/// Without it the existing compiler output is deployed, and the artifacts it was built from
/// must match the live predictions.
#[derive(Parser, Debug)]
pub struct Cmd {
    /// Plan selection
    #[command(flatten)]
    pub plan_args: PlanArgs,

    /// Deployer keys
    #[command(flatten)]
    pub identity_args: IdentityArgs,

    /// Node connection
    #[command(flatten)]
    pub network_args: NetworkArgs,

    /// Output location of the address artifacts
    #[command(flatten)]
    pub output_args: OutputArgs,

    /// Network retry and confirmation bounds
    #[command(flatten)]
    pub retry_args: RetryArgs,

    /// Directory holding the compiler's JSON artifacts
    #[arg(long = "artifacts", default_value = "out")]
    pub artifacts: PathBuf,

    /// Command that rebuilds the compiler output after the addresses are written, e.g.
    /// "forge build"
    #[arg(long = "compile-cmd")]
    pub compile_cmd: Option<String>,

    /// Working directory of --compile-cmd
    #[arg(long = "compile-dir", requires = "compile_cmd")]
    pub compile_dir: Option<PathBuf>,
}

impl Cmd {
    /// Execute the deploy command
    pub async fn run(&self) -> Result<()> {
        let definition = self.plan_args.load()?;
        let identities = self.identity_args.load(definition.identity_slots())?;
        let config = PipelineConfig { retry: self.retry_args.policy()? };
        let ledger = RpcLedger::connect_http(&self.network_args.rpc)?;
        let store = FsArtifactStore::new(&self.output_args.output_root);

        let (cancel_tx, cancel) = CancelSignal::new();
        let ctrl_c = tokio::spawn(cancel_on_ctrl_c(cancel_tx));

        let pipeline = Pipeline::new(config, ledger, store, self.compiler()?).with_cancel(cancel);
        let result = pipeline.run(&definition, &identities).await;
        ctrl_c.abort();

        match result {
            Ok(report) => {
                print_json(&report)?;
                check_grants(&report)
            }
            Err(failure) => {
                print_json(&failure.report)?;
                Err(failure.into())
            }
        }
    }

    fn compiler(&self) -> Result<ArtifactDirCompiler> {
        let compiler = ArtifactDirCompiler::new(&self.artifacts);
        let Some(command_line) = &self.compile_cmd else {
            return Ok(compiler);
        };
        let mut command = CompileCommand::parse(command_line)?;
        if let Some(dir) = &self.compile_dir {
            command = command.with_cwd(dir);
        }
        Ok(compiler.with_command(command))
    }
}

async fn cancel_on_ctrl_c(cancel: watch::Sender<bool>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupted, stopping before the next transaction");
        let _ = cancel.send(true);
    }
}

/// Fails with the first denied grant of `report`.
pub fn check_grants(report: &DeploymentReport) -> Result<()> {
    match report.grants.iter().find(|grant| !grant.outcome.is_granted()) {
        Some(grant) => Err(DeployError::CapabilityDenied {
            target: format!("{} ({})", grant.target, grant.contract),
            grantee: grant.grantee.to_string(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, MainCmd};
    use fhevm_predeploy::Compiler;

    fn deploy_cmd(args: &[&str]) -> Cmd {
        let argv = ["fhevm-deploy", "deploy"].iter().chain(args);
        match Cli::try_parse_from(argv).unwrap().cmd {
            MainCmd::Deploy(cmd) => cmd,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_only_a_compile_command_rewrites_artifacts() {
        assert!(!deploy_cmd(&[]).compiler().unwrap().rebuilds());
        let cmd = deploy_cmd(&["--compile-cmd", "forge build", "--compile-dir", "contracts"]);
        assert!(cmd.compiler().unwrap().rebuilds());
    }
}
