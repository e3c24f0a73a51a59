//! Serializable plan definitions, as read from a plan file.

use std::path::{Path, PathBuf};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{NamingOverrides, PredeployError, Result};

/// A static deployment plan: stages run in order, components within a stage run in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanDefinition {
    /// The stages, in execution order
    pub stages: Vec<StageDefinition>,
}

/// A group of components deployed from one identity, followed by capability grants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Identity slot issuing every transaction of this stage
    pub identity: u32,
    /// Components in deployment order
    pub components: Vec<ComponentDefinition>,
    /// Grants issued once every component of the stage is confirmed
    #[serde(default)]
    pub grants: Vec<GrantDefinition>,
}

/// One component of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// Logical name, unique across the plan
    pub name: String,
    /// Solidity source file, relative to the compile root
    pub source: PathBuf,
    /// Contract name inside the source file; defaults to `name`
    #[serde(default)]
    pub contract: Option<String>,
    /// Constructor arguments, in ABI order
    #[serde(default)]
    pub args: Vec<ArgDefinition>,
    /// Artifact naming overrides
    #[serde(default)]
    pub naming: NamingOverrides,
}

/// A constructor argument.
///
/// In JSON: `{"component": "TFHEExecutor"}`, `"deployer"`, `{"identity": 1}`,
/// `{"address": "0x..."}` or `{"value": "42"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgDefinition {
    /// The predicted address of another component of the plan
    Component(String),
    /// The address of the identity deploying this stage
    Deployer,
    /// The address of the identity in another slot
    Identity(u32),
    /// A fixed address
    Address(Address),
    /// Any other value, coerced to the constructor parameter type
    Value(String),
}

/// An account reference used as a grantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountRef {
    /// The identity deploying this stage
    Deployer,
    /// The identity in another slot
    Identity(u32),
    /// A fixed address
    Address(Address),
}

/// Authorizes `grantee` on the contract deployed for component `target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantDefinition {
    /// Name of the component hosting the access-control entry point
    pub target: String,
    /// The account to authorize
    pub grantee: AccountRef,
}

impl PlanDefinition {
    /// Reads a plan from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| PredeployError::io(path, e))?;
        Self::from_json(&content).map_err(|e| match e {
            PredeployError::InvalidInput(msg) => {
                PredeployError::InvalidInput(format!("{}: {msg}", path.display()))
            }
            other => other,
        })
    }

    /// Parses a plan from JSON.
    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content)
            .map_err(|e| PredeployError::InvalidInput(format!("Invalid plan: {e}")))
    }

    /// Every identity slot the plan refers to, sorted and deduplicated.
    pub fn identity_slots(&self) -> Vec<u32> {
        let mut slots: Vec<u32> = self.stages.iter().map(|stage| stage.identity).collect();
        for stage in &self.stages {
            for component in &stage.components {
                slots.extend(component.args.iter().filter_map(|arg| match arg {
                    ArgDefinition::Identity(slot) => Some(*slot),
                    _ => None,
                }));
            }
            slots.extend(stage.grants.iter().filter_map(|grant| match grant.grantee {
                AccountRef::Identity(slot) => Some(slot),
                _ => None,
            }));
        }
        slots.sort_unstable();
        slots.dedup();
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plan_json() {
        let plan = PlanDefinition::from_json(
            r#"{
                "stages": [{
                    "identity": 0,
                    "components": [
                        {
                            "name": "ACL",
                            "source": "lib/ACL.sol",
                            "args": [{"component": "TFHEExecutor"}],
                            "naming": {"constant_name": "aclAdd"}
                        },
                        {"name": "TFHEExecutor", "source": "lib/TFHEExecutor.sol"}
                    ]
                }, {
                    "identity": 1,
                    "components": [{
                        "name": "GatewayContract",
                        "source": "gateway/GatewayContract.sol",
                        "args": ["deployer", {"identity": 2}, {"value": "7"}]
                    }],
                    "grants": [{"target": "GatewayContract", "grantee": "deployer"}]
                }]
            }"#,
        )
        .unwrap();

        assert_eq!(plan.stages.len(), 2);
        let acl = &plan.stages[0].components[0];
        assert_eq!(acl.args, vec![ArgDefinition::Component("TFHEExecutor".to_string())]);
        assert_eq!(acl.naming.constant_name.as_deref(), Some("aclAdd"));
        assert_eq!(acl.contract, None);
        assert_eq!(
            plan.stages[1].components[0].args,
            vec![
                ArgDefinition::Deployer,
                ArgDefinition::Identity(2),
                ArgDefinition::Value("7".to_string())
            ]
        );
        assert_eq!(plan.stages[1].grants[0].grantee, AccountRef::Deployer);
        assert_eq!(plan.identity_slots(), vec![0, 1, 2]);
    }

    #[test]
    fn test_malformed_plan_is_invalid_input() {
        let err = PlanDefinition::from_json(r#"{"stages": [{"identity": -1}]}"#).unwrap_err();
        assert!(matches!(err, PredeployError::InvalidInput(_)));
    }
}
