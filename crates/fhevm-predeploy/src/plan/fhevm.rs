//! The built-in fhEVM plan.

use std::path::PathBuf;

use super::{
    AccountRef, ArgDefinition, ComponentDefinition, GrantDefinition, PlanDefinition,
    StageDefinition,
};
use crate::NamingOverrides;

/// Identity slot deploying the core contracts.
pub const CORE_IDENTITY: u32 = 0;

/// Identity slot deploying the gateway and acting as its first relayer.
pub const GATEWAY_IDENTITY: u32 = 1;

/// The fhEVM bootstrap plan.
///
/// The core identity deploys `ACL` (which embeds the `TFHEExecutor` address), `TFHEExecutor` and
/// `KMSVerifier` at consecutive nonces. The gateway identity then deploys `GatewayContract` with
/// itself as owner and the predicted `KMSVerifier` address, and authorizes itself as relayer.
///
/// Artifact names match the files the fhEVM Solidity library imports.
pub fn fhevm_plan() -> PlanDefinition {
    PlanDefinition {
        stages: vec![
            StageDefinition {
                identity: CORE_IDENTITY,
                components: vec![
                    component(
                        "ACL",
                        "lib/ACL.sol",
                        vec![ArgDefinition::Component("TFHEExecutor".to_string())],
                        naming("ACL_CONTRACT_ADDRESS", "lib/acl", "aclAdd", "lib/ACL"),
                    ),
                    component(
                        "TFHEExecutor",
                        "lib/TFHEExecutor.sol",
                        vec![],
                        naming(
                            "TFHE_EXECUTOR_CONTRACT_ADDRESS",
                            "lib/exec",
                            "fhevmCoprocessorAdd",
                            "lib/FHEVMCoprocessor",
                        ),
                    ),
                    component(
                        "KMSVerifier",
                        "lib/KMSVerifier.sol",
                        vec![],
                        naming(
                            "KMS_VERIFIER_CONTRACT_ADDRESS",
                            "lib/kmsverifier",
                            "KMS_VERIFIER_CONTRACT_ADDRESS",
                            "lib/KMSVerifier",
                        ),
                    ),
                ],
                grants: vec![],
            },
            StageDefinition {
                identity: GATEWAY_IDENTITY,
                components: vec![component(
                    "GatewayContract",
                    "gateway/GatewayContract.sol",
                    vec![
                        ArgDefinition::Deployer,
                        ArgDefinition::Component("KMSVerifier".to_string()),
                    ],
                    naming(
                        "GATEWAY_CONTRACT_PREDEPLOY_ADDRESS",
                        "gateway/lib/gateway",
                        "GATEWAY_CONTRACT_PREDEPLOY_ADDRESS",
                        "gateway/lib/Predeploy",
                    ),
                )],
                grants: vec![GrantDefinition {
                    target: "GatewayContract".to_string(),
                    grantee: AccountRef::Deployer,
                }],
            },
        ],
    }
}

fn component(
    name: &str,
    source: &str,
    args: Vec<ArgDefinition>,
    naming: NamingOverrides,
) -> ComponentDefinition {
    ComponentDefinition {
        name: name.to_string(),
        source: PathBuf::from(source),
        contract: None,
        args,
        naming,
    }
}

fn naming(
    config_key: &str,
    config_file: &str,
    constant_name: &str,
    source_file: &str,
) -> NamingOverrides {
    NamingOverrides {
        config_key: Some(config_key.to_string()),
        config_file: Some(config_file.to_string()),
        constant_name: Some(constant_name.to_string()),
        source_file: Some(source_file.to_string()),
    }
}
