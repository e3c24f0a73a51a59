//! Runs the `materialize` subcommand into a temporary directory.

use std::fs;

use clap::Parser;
use fhevm_deploy::{Cli, MainCmd};
use fhevm_predeploy::test_utils::{ACCOUNT_0_KEY, ACCOUNT_1_KEY};

fn materialize_cmd(root: &std::path::Path, extra: &[&str]) -> fhevm_deploy::materialize::Cmd {
    let keys = format!("{ACCOUNT_0_KEY},{ACCOUNT_1_KEY}");
    let root = root.to_string_lossy().into_owned();
    let mut args =
        vec!["fhevm-deploy", "materialize", "--private-key", &keys, "--output-root", &root];
    args.extend_from_slice(extra);
    match Cli::try_parse_from(args).unwrap().cmd {
        MainCmd::Materialize(cmd) => cmd,
        other => panic!("unexpected command {other:?}"),
    }
}

#[tokio::test]
async fn test_materialize_fhevm_plan() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = materialize_cmd(dir.path(), &["--base-nonce", "0=0", "--base-nonce", "1=0"]);

    let entries = cmd.materialize().await.unwrap();
    let names: Vec<_> = entries.iter().map(|e| e.component.as_str()).collect();
    assert_eq!(names, vec!["ACL", "TFHEExecutor", "KMSVerifier", "GatewayContract"]);

    let acl = fs::read_to_string(dir.path().join("lib/.env.acl")).unwrap();
    assert_eq!(acl, "ACL_CONTRACT_ADDRESS=0x5FbDB2315678afecb367f032d93F642f64180aa3\n");
    let exec = fs::read_to_string(dir.path().join("lib/FHEVMCoprocessorAddress.sol")).unwrap();
    assert!(exec.contains("0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512"));
    assert!(entries.iter().all(|e| e.config.starts_with(dir.path())));
}

#[tokio::test]
async fn test_materialize_is_repeatable() {
    let dir = tempfile::tempdir().unwrap();
    let cmd = materialize_cmd(dir.path(), &["--base-nonce", "0=3", "--base-nonce", "1=0x7"]);

    let first = cmd.materialize().await.unwrap();
    let before = fs::read_to_string(&first[0].source).unwrap();
    let second = cmd.materialize().await.unwrap();
    assert_eq!(fs::read_to_string(&second[0].source).unwrap(), before);
    assert_eq!(first[0].nonce, 3);
    assert_eq!(first[3].nonce, 7);
}

#[tokio::test]
async fn test_materialize_needs_a_nonce_source() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = materialize_cmd(dir.path(), &["--base-nonce", "0=0"]);
    cmd.rpc = None;

    let err = cmd.materialize().await.unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
}
