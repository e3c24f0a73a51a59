use clap::{Parser, Subcommand};

use crate::common::{LogArgs, Result};

/// Bootstrap deployment of the fhEVM core contracts
#[derive(Parser, Debug)]
#[command(name = "fhevm-deploy", version, infer_subcommands = true)]
pub struct Cli {
    /// Logging configuration
    #[command(flatten)]
    pub log: LogArgs,

    /// The command to run
    #[command(subcommand)]
    pub cmd: MainCmd,
}

/// Main command enumeration for the fhevm-deploy CLI tool
#[derive(Subcommand, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum MainCmd {
    /// Predict the address of a plain deployment
    Predict(crate::predict::Cmd),
    /// Write predicted addresses into config and Solidity files
    Materialize(crate::materialize::Cmd),
    /// Run the full bootstrap against a node
    Deploy(crate::deploy::Cmd),
    /// Authorize a relayer on a deployed gateway contract
    Grant(crate::grant::Cmd),
}

impl MainCmd {
    /// Execute the main command
    pub async fn run(&self) -> Result<()> {
        match self {
            Self::Predict(cmd) => cmd.run(),
            Self::Materialize(cmd) => cmd.run().await,
            Self::Deploy(cmd) => cmd.run().await,
            Self::Grant(cmd) => cmd.run().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    #[test]
    fn test_parse_predict() {
        let cli = Cli::try_parse_from([
            "fhevm-deploy",
            "-vvv",
            "predict",
            "--deployer",
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266",
            "--nonce",
            "0x1",
        ])
        .unwrap();
        assert_eq!(cli.log.verbose, 3);
        let MainCmd::Predict(cmd) = cli.cmd else { panic!("expected predict") };
        assert_eq!(cmd.nonce, "0x1");
        assert!(!cmd.json);
    }

    #[test]
    fn test_parse_deploy() {
        let cli = Cli::try_parse_from([
            "fhevm-deploy",
            "deploy",
            "--rpc",
            "http://node:8545",
            "--private-key",
            "0x01,0x02",
            "--compile-cmd",
            "forge build",
            "--confirmation-timeout",
            "30",
        ])
        .unwrap();
        let MainCmd::Deploy(cmd) = cli.cmd else { panic!("expected deploy") };
        assert_eq!(cmd.network_args.rpc, "http://node:8545");
        assert_eq!(cmd.identity_args.private_keys, vec!["0x01", "0x02"]);
        assert_eq!(cmd.compile_cmd.as_deref(), Some("forge build"));
        assert_eq!(cmd.retry_args.policy().unwrap().confirmation_timeout.as_secs(), 30);
    }

    #[test]
    fn test_parse_grant() {
        let cli = Cli::try_parse_from([
            "fhevm-deploy",
            "grant",
            "--mnemonic",
            "test test test test test test test test test test test junk",
            "--identity",
            "1",
            "--target",
            "0x5FbDB2315678afecb367f032d93F642f64180aa3",
        ])
        .unwrap();
        let MainCmd::Grant(cmd) = cli.cmd else { panic!("expected grant") };
        assert_eq!(cmd.identity, 1);
        assert_eq!(cmd.target, address!("5FbDB2315678afecb367f032d93F642f64180aa3"));
        assert_eq!(cmd.grantee, None);
    }

    #[test]
    fn test_rejects_bad_base_nonce() {
        let err = Cli::try_parse_from([
            "fhevm-deploy",
            "materialize",
            "--private-key",
            "0x01",
            "--base-nonce",
            "zero",
        ])
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn test_compile_dir_requires_command() {
        assert!(Cli::try_parse_from(["fhevm-deploy", "deploy", "--compile-dir", "contracts"])
            .is_err());
    }
}
