use std::{
    collections::HashMap,
    sync::atomic::{AtomicUsize, Ordering},
};

use alloy_primitives::Bytes;
use alloy_sol_types::SolCall;

use crate::{CompiledContract, Compiler, ComponentSpec, IGatewayContract, PredeployError, Result};

/// First byte of creation code that the [`MockLedger`](super::MockLedger) treats as a revert.
pub const REVERT_MARKER: u8 = 0xfe;

/// A [`Compiler`] serving fixed contracts by contract name.
#[derive(Debug, Default)]
pub struct StaticCompiler {
    contracts: HashMap<String, CompiledContract>,
    prepared: AtomicUsize,
    prebuilt: bool,
}

impl StaticCompiler {
    /// Adds or replaces a contract.
    pub fn insert(&mut self, contract: &str, compiled: CompiledContract) {
        self.contracts.insert(contract.to_string(), compiled);
    }

    /// Adds a contract from a compiler artifact.
    pub fn contract(mut self, contract: &str, artifact_json: &str) -> Self {
        let compiled = CompiledContract::from_artifact_json(contract, artifact_json).unwrap();
        self.insert(contract, compiled);
        self
    }

    /// Removes a contract, as if its artifact were missing.
    pub fn remove(&mut self, contract: &str) {
        self.contracts.remove(contract);
    }

    /// Makes the creation code of `contract` revert on the mock ledger.
    pub fn make_reverting(&mut self, contract: &str) {
        let compiled = self.contracts.get_mut(contract).unwrap();
        let mut code = compiled.bytecode.to_vec();
        code.insert(0, REVERT_MARKER);
        compiled.bytecode = code.into();
    }

    /// Serves the contracts as already-built output that [`Compiler::prepare`] does not
    /// rebuild.
    pub fn prebuilt(mut self) -> Self {
        self.prebuilt = true;
        self
    }

    /// How many times [`Compiler::prepare`] ran.
    pub fn prepared(&self) -> usize {
        self.prepared.load(Ordering::SeqCst)
    }
}

impl Compiler for StaticCompiler {
    fn rebuilds(&self) -> bool {
        !self.prebuilt
    }

    fn prepare(&self) -> Result<()> {
        self.prepared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn compile(&self, component: &ComponentSpec) -> Result<CompiledContract> {
        self.contracts.get(&component.contract).cloned().ok_or_else(|| PredeployError::Compile {
            component: component.name.clone(),
            reason: format!("No artifact for {}", component.contract),
        })
    }
}

/// Code that accepts `addRelayer` calls on the mock ledger.
pub fn gateway_code() -> Bytes {
    let mut code = vec![0x60, 0x80, 0x60, 0x40];
    code.extend_from_slice(&IGatewayContract::addRelayerCall::SELECTOR);
    code.into()
}

fn artifact(constructor_inputs: &[&str], bytecode: &Bytes) -> String {
    let abi = if constructor_inputs.is_empty() {
        "[]".to_string()
    } else {
        let inputs = constructor_inputs
            .iter()
            .map(|name| format!(r#"{{"name":"{name}","type":"address","internalType":"address"}}"#))
            .collect::<Vec<_>>()
            .join(",");
        format!(r#"[{{"type":"constructor","stateMutability":"nonpayable","inputs":[{inputs}]}}]"#)
    };
    format!(r#"{{"abi":{abi},"bytecode":{{"object":"{bytecode}"}}}}"#)
}

/// Contracts matching the constructors of the fhEVM core.
///
/// Each creation code is distinct; the gateway's answers `addRelayer` on the mock ledger.
pub fn fhevm_compiler() -> StaticCompiler {
    StaticCompiler::default()
        .contract("ACL", &artifact(&["tfheExecutorAddress"], &Bytes::from_static(&[0x60, 0x01])))
        .contract("TFHEExecutor", &artifact(&[], &Bytes::from_static(&[0x60, 0x02])))
        .contract("KMSVerifier", &artifact(&[], &Bytes::from_static(&[0x60, 0x03])))
        .contract("GatewayContract", &artifact(&["_gatewayOwner", "_kmsVerifier"], &gateway_code()))
}
