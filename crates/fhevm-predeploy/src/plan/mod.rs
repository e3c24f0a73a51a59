//! Deployment plans.
//!
//! A [`PlanDefinition`] is the static, serializable description of what to deploy. Building it
//! into a [`DeploymentPlan`] assigns every component its nonce, predicts its address and
//! resolves cross-references into [`ComponentId`]s, so the sequencer only ever walks an arena
//! in order and never looks an address up on chain.

mod definition;
pub use definition::*;

mod fhevm;
pub use fhevm::*;

use std::{
    collections::{BTreeMap, HashMap},
    ops::Range,
    path::PathBuf,
};

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{predict, ArtifactNames, PredeployError, PredictedAddress, Result};

/// Index of a component in a [`DeploymentPlan`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[display("#{_0}")]
pub struct ComponentId(usize);

impl ComponentId {
    /// Position of the component in the plan.
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A deployer account and the transaction count the plan starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeployerAccount {
    /// The deployer address
    pub address: Address,
    /// The nonce the first transaction of this account will use
    pub base_nonce: u64,
}

/// A constructor argument after plan resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedArg {
    /// An address, either predicted or fixed
    Address(Address),
    /// A literal, coerced to the parameter type at encoding time
    Value(String),
}

impl ResolvedArg {
    /// The argument as a string accepted by ABI type coercion.
    pub fn to_abi_string(&self) -> String {
        match self {
            Self::Address(address) => address.to_string(),
            Self::Value(value) => value.clone(),
        }
    }
}

/// One component of a built plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComponentSpec {
    /// Position in the plan
    pub id: ComponentId,
    /// Logical name
    pub name: String,
    /// Solidity source file
    pub source: PathBuf,
    /// Contract name inside the source file
    pub contract: String,
    /// Index of the stage deploying this component
    pub stage: usize,
    /// The address this component must land at
    pub predicted: PredictedAddress,
    /// Constructor arguments, forward references already resolved to predictions
    pub args: Vec<ResolvedArg>,
    /// Components whose predicted address appears in `args`
    pub depends_on: Vec<ComponentId>,
    /// Artifact names for the materializer
    pub names: ArtifactNames,
}

impl ComponentSpec {
    /// The nonce the deployment transaction must consume.
    pub const fn expected_nonce(&self) -> u64 {
        self.predicted.nonce
    }
}

/// A capability grant resolved against the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityGrant {
    /// The component hosting the access-control entry point
    pub target: ComponentId,
    /// The account to authorize
    pub grantee: Address,
}

/// A stage of a built plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    /// Identity slot issuing the stage's transactions
    pub identity: u32,
    /// Address of that identity
    pub deployer: Address,
    /// Nonce of the stage's first transaction
    pub base_nonce: u64,
    /// Grants issued after the stage's components are confirmed
    pub grants: Vec<CapabilityGrant>,
    components: Range<usize>,
}

impl Stage {
    /// Ids of the stage's components, in deployment order.
    pub fn component_ids(&self) -> impl Iterator<Item = ComponentId> + '_ {
        self.components.clone().map(ComponentId)
    }

    /// Number of transactions the stage issues.
    pub fn transaction_count(&self) -> u64 {
        (self.components.len() + self.grants.len()) as u64
    }
}

/// A plan with every address predicted and every reference resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentPlan {
    stages: Vec<Stage>,
    components: Vec<ComponentSpec>,
}

impl DeploymentPlan {
    /// Builds a plan, predicting every component address.
    ///
    /// Components consume consecutive nonces of their stage's identity starting at the
    /// account's base nonce. A later stage of the same identity continues after the previous
    /// stage's components and grants.
    pub fn build(
        definition: &PlanDefinition,
        accounts: &BTreeMap<u32, DeployerAccount>,
    ) -> Result<Self> {
        let account = |slot: u32| {
            accounts.get(&slot).copied().ok_or_else(|| {
                PredeployError::InvalidInput(format!(
                    "No deployer account for identity slot {slot}"
                ))
            })
        };

        // First pass: ids, nonces and predictions.
        let mut next_nonce: HashMap<u32, u64> = HashMap::new();
        let mut ids: HashMap<&str, ComponentId> = HashMap::new();
        let mut predictions = Vec::new();
        let mut stage_ranges = Vec::with_capacity(definition.stages.len());
        for stage in &definition.stages {
            let deployer = account(stage.identity)?;
            let nonce = next_nonce.entry(stage.identity).or_insert(deployer.base_nonce);
            let base_nonce = *nonce;
            let start = predictions.len();
            for component in &stage.components {
                if component.name.trim().is_empty() {
                    return Err(PredeployError::InvalidInput(
                        "Component names must not be empty".to_string(),
                    ));
                }
                let id = ComponentId(predictions.len());
                if ids.insert(component.name.as_str(), id).is_some() {
                    return Err(PredeployError::InvalidInput(format!(
                        "Component {} is declared twice",
                        component.name
                    )));
                }
                predictions.push(predict(deployer.address, *nonce));
                *nonce = nonce.checked_add(1).ok_or_else(|| {
                    PredeployError::InvalidInput(format!("Nonce overflow at {}", component.name))
                })?;
            }
            *nonce = u64::try_from(stage.grants.len())
                .ok()
                .and_then(|grants| nonce.checked_add(grants))
                .ok_or_else(|| {
                    PredeployError::InvalidInput(format!(
                        "Nonce overflow in the grants of identity {}",
                        stage.identity
                    ))
                })?;
            stage_ranges.push((start..predictions.len(), base_nonce));
        }

        // Second pass: resolve references against the predictions.
        let mut stages = Vec::with_capacity(definition.stages.len());
        let mut components = Vec::with_capacity(predictions.len());
        for (stage_index, (stage, (range, base_nonce))) in
            definition.stages.iter().zip(stage_ranges).enumerate()
        {
            let deployer = account(stage.identity)?;
            let resolve_account = |account_ref: AccountRef| match account_ref {
                AccountRef::Deployer => Ok(deployer.address),
                AccountRef::Identity(slot) => account(slot).map(|a| a.address),
                AccountRef::Address(address) => Ok(address),
            };

            for (component, index) in stage.components.iter().zip(range.clone()) {
                let id = ComponentId(index);
                let mut args = Vec::with_capacity(component.args.len());
                let mut depends_on = Vec::new();
                for arg in &component.args {
                    let resolved = match arg {
                        ArgDefinition::Component(name) => {
                            let target = *ids.get(name.as_str()).ok_or_else(|| {
                                PredeployError::InvalidInput(format!(
                                    "{} references unknown component {name}",
                                    component.name
                                ))
                            })?;
                            if target == id {
                                return Err(PredeployError::InvalidInput(format!(
                                    "{} references itself",
                                    component.name
                                )));
                            }
                            if !depends_on.contains(&target) {
                                depends_on.push(target);
                            }
                            ResolvedArg::Address(predictions[target.0].address)
                        }
                        ArgDefinition::Deployer => {
                            ResolvedArg::Address(resolve_account(AccountRef::Deployer)?)
                        }
                        ArgDefinition::Identity(slot) => {
                            ResolvedArg::Address(resolve_account(AccountRef::Identity(*slot))?)
                        }
                        ArgDefinition::Address(address) => ResolvedArg::Address(*address),
                        ArgDefinition::Value(value) => ResolvedArg::Value(value.clone()),
                    };
                    args.push(resolved);
                }

                components.push(ComponentSpec {
                    id,
                    name: component.name.clone(),
                    source: component.source.clone(),
                    contract: component.contract.clone().unwrap_or_else(|| component.name.clone()),
                    stage: stage_index,
                    predicted: predictions[index],
                    args,
                    depends_on,
                    names: ArtifactNames::derive(&component.name).with_overrides(&component.naming),
                });
            }

            let mut grants = Vec::with_capacity(stage.grants.len());
            for grant in &stage.grants {
                let target = *ids.get(grant.target.as_str()).ok_or_else(|| {
                    PredeployError::InvalidInput(format!(
                        "Grant targets unknown component {}",
                        grant.target
                    ))
                })?;
                if target.0 >= range.end {
                    return Err(PredeployError::InvalidInput(format!(
                        "Grant on {} is issued before {} is deployed",
                        grant.target, grant.target
                    )));
                }
                grants.push(CapabilityGrant { target, grantee: resolve_account(grant.grantee)? });
            }

            stages.push(Stage {
                identity: stage.identity,
                deployer: deployer.address,
                base_nonce,
                grants,
                components: range,
            });
        }

        Ok(Self { stages, components })
    }

    /// The stages, in execution order.
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Every component, in deployment order.
    pub fn components(&self) -> &[ComponentSpec] {
        &self.components
    }

    /// The component with the given id.
    pub fn component(&self, id: ComponentId) -> &ComponentSpec {
        &self.components[id.0]
    }

    /// The components of `stage`, in deployment order.
    pub fn stage_components(&self, stage: &Stage) -> &[ComponentSpec] {
        &self.components[stage.components.clone()]
    }

    /// Looks a component up by logical name.
    pub fn find(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|component| component.name == name)
    }
}
