//! Compiler output.
//!
//! Compiling Solidity is somebody else's job. The pipeline only needs, per component, the ABI
//! (for the constructor) and the creation bytecode, which it reads from the artifacts a
//! Foundry, Hardhat or plain solc run leaves behind.

use std::{
    path::{Path, PathBuf},
    process::Command,
};

use alloy_dyn_abi::{DynSolType, DynSolValue, Specifier};
use alloy_json_abi::JsonAbi;
use alloy_primitives::{hex, Bytes};
use auto_impl::auto_impl;
use serde_json::Value;
use tracing::{debug, info};

use crate::{plan::ResolvedArg, ComponentSpec, PredeployError, Result};

/// ABI and creation bytecode of one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledContract {
    /// The contract ABI
    pub abi: JsonAbi,
    /// Creation bytecode, without constructor arguments
    pub bytecode: Bytes,
}

impl CompiledContract {
    /// Parses a compiler artifact.
    ///
    /// Accepted shapes: Foundry (`bytecode.object`), Hardhat (`bytecode` as a string) and solc
    /// standard JSON output (`evm.bytecode.object`).
    pub fn from_artifact_json(component: &str, content: &str) -> Result<Self> {
        let compile_error =
            |reason: String| PredeployError::Compile { component: component.to_string(), reason };

        let value: Value =
            serde_json::from_str(content).map_err(|e| compile_error(format!("Invalid JSON: {e}")))?;
        let abi = value
            .get("abi")
            .cloned()
            .ok_or_else(|| compile_error("Missing abi".to_string()))
            .and_then(|abi| {
                serde_json::from_value::<JsonAbi>(abi)
                    .map_err(|e| compile_error(format!("Invalid abi: {e}")))
            })?;

        let bytecode = value
            .get("bytecode")
            .or_else(|| value.pointer("/evm/bytecode"))
            .and_then(|bytecode| match bytecode {
                Value::String(s) => Some(s.as_str()),
                other => other.get("object").and_then(Value::as_str),
            })
            .ok_or_else(|| compile_error("Missing creation bytecode".to_string()))?;
        let bytecode = hex::decode(bytecode.trim())
            .map_err(|e| compile_error(format!("Bytecode is not hex (unlinked library?): {e}")))?;
        if bytecode.is_empty() {
            return Err(compile_error(
                "Empty creation bytecode (abstract contract or interface?)".to_string(),
            ));
        }

        Ok(Self { abi, bytecode: bytecode.into() })
    }

    /// The input of the deployment transaction: creation bytecode followed by the ABI-encoded
    /// constructor arguments.
    ///
    /// Each argument is coerced to the type of the matching constructor parameter.
    pub fn deployment_input(&self, component: &str, args: &[ResolvedArg]) -> Result<Bytes> {
        let params = self.abi.constructor.as_ref().map(|c| c.inputs.as_slice()).unwrap_or_default();
        if params.len() != args.len() {
            return Err(PredeployError::InvalidInput(format!(
                "{component} takes {} constructor argument(s), the plan provides {}",
                params.len(),
                args.len()
            )));
        }

        let mut values = Vec::with_capacity(args.len());
        for (param, arg) in params.iter().zip(args) {
            let ty: DynSolType = param.resolve().map_err(|e| PredeployError::Compile {
                component: component.to_string(),
                reason: format!("Unsupported constructor parameter {}: {e}", param.name),
            })?;
            let value = ty.coerce_str(&arg.to_abi_string()).map_err(|e| {
                PredeployError::InvalidInput(format!(
                    "Argument {} of {component} is not a valid {ty}: {e}",
                    param.name
                ))
            })?;
            values.push(value);
        }

        let mut input = self.bytecode.to_vec();
        if !values.is_empty() {
            input.extend_from_slice(&DynSolValue::Tuple(values).abi_encode_params());
        }
        Ok(input.into())
    }
}

/// Provides compiled contracts for plan components.
#[auto_impl(&, Arc, Box)]
pub trait Compiler {
    /// Whether [`Compiler::prepare`] rebuilds the contracts from the current address artifacts.
    ///
    /// A compiler that only reads existing output must be run against artifacts that already
    /// match the plan, so the pipeline checks them instead of rewriting them.
    fn rebuilds(&self) -> bool {
        false
    }

    /// Runs once before any component is compiled, after the artifacts are checked.
    fn prepare(&self) -> Result<()> {
        Ok(())
    }

    /// Returns the compiled contract for `component`.
    fn compile(&self, component: &ComponentSpec) -> Result<CompiledContract>;
}

/// An external command that rebuilds the compiler output, e.g. `forge build`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileCommand {
    /// Program to spawn
    pub program: String,
    /// Arguments passed to the program
    pub args: Vec<String>,
    /// Working directory; inherits the current one when unset
    pub cwd: Option<PathBuf>,
}

impl CompileCommand {
    /// Splits a whitespace-separated command line.
    pub fn parse(command_line: &str) -> Result<Self> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| PredeployError::InvalidInput("Empty compile command".to_string()))?;
        Ok(Self { program, args: words.collect(), cwd: None })
    }

    /// Sets the working directory.
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    /// Runs the command to completion, inheriting stdio.
    pub fn run(&self) -> Result<()> {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        info!(program = %self.program, args = ?self.args, "Running compile command");
        let status = command.status().map_err(|e| PredeployError::Compile {
            component: self.program.clone(),
            reason: format!("Failed to spawn: {e}"),
        })?;
        if status.success() {
            Ok(())
        } else {
            Err(PredeployError::Compile {
                component: self.program.clone(),
                reason: format!("Compile command exited with {status}"),
            })
        }
    }
}

/// Reads compiler artifacts from an output directory.
///
/// For a component with source `lib/ACL.sol` and contract `ACL`, the artifact is looked up at
/// `<out>/lib/ACL.sol/ACL.json` (Hardhat) and then at `<out>/ACL.sol/ACL.json` (Foundry).
#[derive(Debug, Clone)]
pub struct ArtifactDirCompiler {
    out_dir: PathBuf,
    command: Option<CompileCommand>,
}

impl ArtifactDirCompiler {
    /// Reads artifacts from `out_dir` as they are.
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self { out_dir: out_dir.into(), command: None }
    }

    /// Runs `command` in [`Compiler::prepare`] to rebuild the artifacts first.
    pub fn with_command(mut self, command: CompileCommand) -> Self {
        self.command = Some(command);
        self
    }

    /// The artifact directory.
    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    fn candidates(&self, component: &ComponentSpec) -> Vec<PathBuf> {
        let file = format!("{}.json", component.contract);
        let mut candidates = vec![self.out_dir.join(&component.source).join(&file)];
        if let Some(name) = component.source.file_name() {
            let flat = self.out_dir.join(name).join(&file);
            if !candidates.contains(&flat) {
                candidates.push(flat);
            }
        }
        candidates
    }
}

impl Compiler for ArtifactDirCompiler {
    fn rebuilds(&self) -> bool {
        self.command.is_some()
    }

    fn prepare(&self) -> Result<()> {
        self.command.as_ref().map_or(Ok(()), CompileCommand::run)
    }

    fn compile(&self, component: &ComponentSpec) -> Result<CompiledContract> {
        let candidates = self.candidates(component);
        for path in &candidates {
            match std::fs::read_to_string(path) {
                Ok(content) => {
                    debug!(
                        component = %component.name,
                        path = %path.display(),
                        "Reading compiler artifact"
                    );
                    return CompiledContract::from_artifact_json(&component.name, &content);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(PredeployError::io(path, e)),
            }
        }
        Err(PredeployError::Compile {
            component: component.name.clone(),
            reason: format!(
                "No compiler artifact at {}",
                candidates.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" or ")
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::{
        plan::{fhevm_plan, DeployerAccount},
        DeploymentPlan,
    };
    use alloy_primitives::{address, Address};

    const ADDRESS_CTOR_ABI: &str = r#"[{
        "type": "constructor",
        "stateMutability": "nonpayable",
        "inputs": [{"name": "executor", "type": "address", "internalType": "address"}]
    }]"#;

    fn foundry_artifact(abi: &str, bytecode: &str) -> String {
        format!(r#"{{"abi": {abi}, "bytecode": {{"object": "{bytecode}"}}}}"#)
    }

    fn plan() -> DeploymentPlan {
        let accounts = BTreeMap::from([
            (0, DeployerAccount { address: Address::repeat_byte(1), base_nonce: 0 }),
            (1, DeployerAccount { address: Address::repeat_byte(2), base_nonce: 0 }),
        ]);
        DeploymentPlan::build(&fhevm_plan(), &accounts).unwrap()
    }

    #[test]
    fn test_constructor_arguments_follow_bytecode() {
        let contract = CompiledContract::from_artifact_json(
            "ACL",
            &foundry_artifact(ADDRESS_CTOR_ABI, "0x6080604052"),
        )
        .unwrap();
        let executor = address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512");

        let input = contract.deployment_input("ACL", &[ResolvedArg::Address(executor)]).unwrap();
        assert_eq!(input.len(), 5 + 32);
        assert_eq!(&input[..5], &[0x60, 0x80, 0x60, 0x40, 0x52]);
        assert_eq!(&input[5..17], &[0u8; 12]);
        assert_eq!(&input[17..], executor.as_slice());
    }

    #[test]
    fn test_argument_count_and_type_mismatches() {
        let contract = CompiledContract::from_artifact_json(
            "ACL",
            &foundry_artifact(ADDRESS_CTOR_ABI, "0x00"),
        )
        .unwrap();
        assert!(matches!(
            contract.deployment_input("ACL", &[]),
            Err(PredeployError::InvalidInput(_))
        ));
        assert!(matches!(
            contract.deployment_input("ACL", &[ResolvedArg::Value("not an address".to_string())]),
            Err(PredeployError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_artifact_shapes() {
        let hardhat = r#"{"abi": [], "bytecode": "0x6001"}"#;
        let solc = r#"{"abi": [], "evm": {"bytecode": {"object": "6002"}}}"#;
        assert_eq!(
            CompiledContract::from_artifact_json("X", hardhat).unwrap().bytecode,
            Bytes::from_static(&[0x60, 0x01])
        );
        assert_eq!(
            CompiledContract::from_artifact_json("X", solc).unwrap().bytecode,
            Bytes::from_static(&[0x60, 0x02])
        );
        // No constructor: the input is the bare bytecode.
        let contract = CompiledContract::from_artifact_json("X", hardhat).unwrap();
        assert_eq!(contract.deployment_input("X", &[]).unwrap(), contract.bytecode);

        for broken in [
            r#"{"bytecode": "0x60"}"#,
            r#"{"abi": []}"#,
            r#"{"abi": [], "bytecode": "0x"}"#,
            r#"{"abi": [], "bytecode": "0x73__$abcdef$__"}"#,
        ] {
            assert!(
                matches!(
                    CompiledContract::from_artifact_json("X", broken),
                    Err(PredeployError::Compile { .. })
                ),
                "{broken}"
            );
        }
    }

    #[test]
    fn test_artifact_dir_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let plan = plan();

        // Foundry flattens the source directory away.
        let foundry = dir.path().join("ACL.sol");
        std::fs::create_dir_all(&foundry).unwrap();
        std::fs::write(foundry.join("ACL.json"), foundry_artifact(ADDRESS_CTOR_ABI, "0x60"))
            .unwrap();
        // Hardhat keeps it.
        let hardhat = dir.path().join("lib/KMSVerifier.sol");
        std::fs::create_dir_all(&hardhat).unwrap();
        std::fs::write(hardhat.join("KMSVerifier.json"), r#"{"abi": [], "bytecode": "0x61"}"#)
            .unwrap();

        let compiler = ArtifactDirCompiler::new(dir.path());
        compiler.prepare().unwrap();
        assert!(compiler.compile(plan.find("ACL").unwrap()).unwrap().abi.constructor.is_some());
        assert_eq!(
            compiler.compile(plan.find("KMSVerifier").unwrap()).unwrap().bytecode,
            Bytes::from_static(&[0x61])
        );
        assert!(matches!(
            compiler.compile(plan.find("TFHEExecutor").unwrap()),
            Err(PredeployError::Compile { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_compile_command_status() {
        CompileCommand::parse("true").unwrap().run().unwrap();
        assert!(matches!(
            CompileCommand::parse("false").unwrap().run(),
            Err(PredeployError::Compile { .. })
        ));
        assert!(matches!(CompileCommand::parse("  "), Err(PredeployError::InvalidInput(_))));
    }
}
