//! Writes predicted addresses into the artifacts the compiler and the runtime consume.

use std::path::PathBuf;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{ArtifactKind, ArtifactStore, PredeployError, PredictedAddress, Result};

/// Banner written ahead of every generated Solidity constant.
pub const SOURCE_CONSTANT_HEADER: &str =
    "// SPDX-License-Identifier: BSD-3-Clause-Clear\n\npragma solidity ^0.8.24;\n";

/// Suffix appended to derived config keys.
pub const CONFIG_KEY_SUFFIX: &str = "_CONTRACT_ADDRESS";

/// How one component's prediction is named in each artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactNames {
    /// Key of the `KEY=0x...` config entry
    pub config_key: String,
    /// Store name of the config artifact
    pub config_file: String,
    /// Identifier of the Solidity `address constant`
    pub constant_name: String,
    /// Store name of the Solidity artifact
    pub source_file: String,
}

impl ArtifactNames {
    /// Derives every name from the component's logical name.
    ///
    /// `KMSVerifier` yields the key `KMS_VERIFIER_CONTRACT_ADDRESS` (also used as the constant
    /// name), the config file `kmsverifier` and the source file `KMSVerifier`.
    pub fn derive(logical_name: &str) -> Self {
        let config_key = format!("{}{CONFIG_KEY_SUFFIX}", upper_snake_case(logical_name));
        Self {
            constant_name: config_key.clone(),
            config_key,
            config_file: logical_name.to_ascii_lowercase(),
            source_file: logical_name.to_string(),
        }
    }

    /// Applies the non-empty overrides on top of these names.
    pub fn with_overrides(mut self, overrides: &NamingOverrides) -> Self {
        let pick = |value: &Option<String>, slot: &mut String| {
            if let Some(value) = value.as_ref().filter(|v| !v.is_empty()) {
                slot.clone_from(value);
            }
        };
        pick(&overrides.config_key, &mut self.config_key);
        pick(&overrides.config_file, &mut self.config_file);
        pick(&overrides.constant_name, &mut self.constant_name);
        pick(&overrides.source_file, &mut self.source_file);
        self
    }
}

/// Per-component naming overrides from a plan file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingOverrides {
    /// Overrides [`ArtifactNames::config_key`]
    pub config_key: Option<String>,
    /// Overrides [`ArtifactNames::config_file`]
    pub config_file: Option<String>,
    /// Overrides [`ArtifactNames::constant_name`]
    pub constant_name: Option<String>,
    /// Overrides [`ArtifactNames::source_file`]
    pub source_file: Option<String>,
}

/// One written artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedArtifact {
    /// Where the artifact was written
    pub target_path: PathBuf,
    /// The full file content
    pub content: String,
    /// The consumer it was written for
    pub kind: ArtifactKind,
}

/// The pair of artifacts written for one prediction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Materialized {
    /// The `KEY=0x...` config artifact
    pub config: MaterializedArtifact,
    /// The Solidity constant artifact
    pub source: MaterializedArtifact,
}

impl Materialized {
    /// Path of the config artifact.
    pub fn config_path(&self) -> &PathBuf {
        &self.config.target_path
    }

    /// Path of the source-constant artifact.
    pub fn source_path(&self) -> &PathBuf {
        &self.source.target_path
    }
}

/// Materializes predictions through an [`ArtifactStore`].
#[derive(Debug, Clone)]
pub struct Materializer<S> {
    store: S,
}

impl<S: ArtifactStore> Materializer<S> {
    /// Creates a materializer writing into `store`.
    pub const fn new(store: S) -> Self {
        Self { store }
    }

    /// The backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Writes the config entry and the Solidity constant for `predicted`.
    ///
    /// Each artifact is replaced entirely, so repeating the call with the same inputs rewrites
    /// identical bytes. The first write error aborts; the caller must not compile against a
    /// partially materialized set.
    pub fn materialize(
        &self,
        logical_name: &str,
        names: &ArtifactNames,
        predicted: &PredictedAddress,
    ) -> Result<Materialized> {
        validate_identifier(logical_name, &names.config_key)?;
        validate_identifier(logical_name, &names.constant_name)?;

        let config_content = render_config(&names.config_key, predicted.address);
        let config_path =
            self.store.put(&names.config_file, ArtifactKind::Config, config_content.as_bytes())?;
        info!(
            component = logical_name,
            path = %config_path.display(),
            address = %predicted.address,
            "Config artifact written"
        );

        let source_content = render_source_constant(&names.constant_name, predicted.address);
        let source_path = self.store.put(
            &names.source_file,
            ArtifactKind::SourceConstant,
            source_content.as_bytes(),
        )?;
        info!(
            component = logical_name,
            path = %source_path.display(),
            address = %predicted.address,
            "Source constant written"
        );

        Ok(Materialized {
            config: MaterializedArtifact {
                target_path: config_path,
                content: config_content,
                kind: ArtifactKind::Config,
            },
            source: MaterializedArtifact {
                target_path: source_path,
                content: source_content,
                kind: ArtifactKind::SourceConstant,
            },
        })
    }

    /// Fails with [`PredeployError::StaleArtifact`] unless both stored artifacts are exactly
    /// what [`Materializer::materialize`] would write for `predicted`.
    ///
    /// The Solidity constant is checked first since it is what ends up in the bytecode.
    pub fn check(
        &self,
        logical_name: &str,
        names: &ArtifactNames,
        predicted: &PredictedAddress,
    ) -> Result<()> {
        let source = self.store.get(&names.source_file, ArtifactKind::SourceConstant)?;
        let expected = render_source_constant(&names.constant_name, predicted.address);
        if source.as_deref() != Some(expected.as_bytes()) {
            let found = source
                .as_deref()
                .map(String::from_utf8_lossy)
                .and_then(|content| parse_source_constant(&content, &names.constant_name));
            return Err(stale(logical_name, &names.constant_name, found, predicted));
        }

        let config = self.store.get(&names.config_file, ArtifactKind::Config)?;
        let expected = render_config(&names.config_key, predicted.address);
        if config.as_deref() != Some(expected.as_bytes()) {
            let found = config
                .as_deref()
                .map(String::from_utf8_lossy)
                .and_then(|content| parse_config_value(&content, &names.config_key));
            return Err(stale(logical_name, &names.config_key, found, predicted));
        }
        Ok(())
    }
}

fn stale(
    component: &str,
    key: &str,
    found: Option<String>,
    predicted: &PredictedAddress,
) -> PredeployError {
    PredeployError::StaleArtifact {
        component: component.to_string(),
        key: key.to_string(),
        found: found.unwrap_or_default(),
        expected: predicted.address,
    }
}

/// Renders the config artifact: a single `KEY=0x...` line.
pub fn render_config(key: &str, address: Address) -> String {
    format!("{key}={address}\n")
}

/// Renders the Solidity artifact: the banner followed by one `address constant`.
///
/// The address is EIP-55 checksummed, as Solidity requires for address literals.
pub fn render_source_constant(constant_name: &str, address: Address) -> String {
    format!("{SOURCE_CONSTANT_HEADER}\naddress constant {constant_name} = {address};\n")
}

/// Returns the value bound to `key` in a `KEY=VALUE` document.
pub fn parse_config_value(content: &str, key: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let (k, v) = line.trim().split_once('=')?;
        (k.trim() == key).then(|| v.trim().to_string())
    })
}

/// Returns the value of `address constant <name> = <value>;` in a Solidity document.
pub fn parse_source_constant(content: &str, name: &str) -> Option<String> {
    content.lines().find_map(|line| {
        let rest = line.trim().strip_prefix("address constant")?;
        let (ident, value) = rest.split_once('=')?;
        (ident.trim() == name).then(|| value.trim().trim_end_matches(';').trim().to_string())
    })
}

/// Converts `KMSVerifier` to `KMS_VERIFIER`, `TFHEExecutor` to `TFHE_EXECUTOR` and
/// `GatewayContract` to `GATEWAY_CONTRACT`.
///
/// A word boundary sits before an uppercase letter that follows a lowercase letter or digit, and
/// before the last uppercase letter of an acronym that is followed by a lowercase letter.
/// Non-alphanumeric characters become separators.
pub fn upper_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            continue;
        }
        if c.is_ascii_uppercase() && i > 0 && !out.is_empty() && !out.ends_with('_') {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase() ||
                prev.is_ascii_digit() ||
                (prev.is_ascii_uppercase() && next_is_lower)
            {
                out.push('_');
            }
        }
        out.push(c.to_ascii_uppercase());
    }
    out.trim_end_matches('_').to_string()
}

fn validate_identifier(component: &str, ident: &str) -> Result<()> {
    let mut chars = ident.chars();
    let valid_start = chars.next().is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$');
    if valid_start && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
        Ok(())
    } else {
        Err(PredeployError::InvalidInput(format!(
            "Invalid identifier '{ident}' for component {component}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{predict, test_utils::MemoryArtifactStore};
    use alloy_primitives::address;
    use rstest::rstest;

    const DEPLOYER: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    #[rstest]
    #[case("ACL", "ACL")]
    #[case("TFHEExecutor", "TFHE_EXECUTOR")]
    #[case("KMSVerifier", "KMS_VERIFIER")]
    #[case("GatewayContract", "GATEWAY_CONTRACT")]
    #[case("gateway", "GATEWAY")]
    #[case("Erc20V2Token", "ERC20_V2_TOKEN")]
    #[case("my-contract", "MY_CONTRACT")]
    fn test_upper_snake_case(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(upper_snake_case(input), expected);
    }

    #[test]
    fn test_derived_names() {
        let names = ArtifactNames::derive("KMSVerifier");
        assert_eq!(names.config_key, "KMS_VERIFIER_CONTRACT_ADDRESS");
        assert_eq!(names.constant_name, "KMS_VERIFIER_CONTRACT_ADDRESS");
        assert_eq!(names.config_file, "kmsverifier");
        assert_eq!(names.source_file, "KMSVerifier");

        let overridden = names.with_overrides(&NamingOverrides {
            constant_name: Some("kmsAdd".to_string()),
            config_file: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(overridden.constant_name, "kmsAdd");
        assert_eq!(overridden.config_file, "kmsverifier");
    }

    #[test]
    fn test_rendered_source_constant() {
        let address = address!("5FbDB2315678afecb367f032d93F642f64180aa3");
        assert_eq!(
            render_source_constant("aclAdd", address),
            "// SPDX-License-Identifier: BSD-3-Clause-Clear\n\npragma solidity ^0.8.24;\n\n\
             address constant aclAdd = 0x5FbDB2315678afecb367f032d93F642f64180aa3;\n"
        );
        assert_eq!(
            render_config("ACL_CONTRACT_ADDRESS", address),
            "ACL_CONTRACT_ADDRESS=0x5FbDB2315678afecb367f032d93F642f64180aa3\n"
        );
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let materializer = Materializer::new(MemoryArtifactStore::default());
        let names = ArtifactNames::derive("ACL");
        let predicted = predict(DEPLOYER, 0);

        let first = materializer.materialize("ACL", &names, &predicted).unwrap();
        let first_config = materializer.store().get("acl", ArtifactKind::Config).unwrap();
        let first_source = materializer.store().get("ACL", ArtifactKind::SourceConstant).unwrap();

        let second = materializer.materialize("ACL", &names, &predicted).unwrap();
        assert_eq!(first, second);
        assert_eq!(materializer.store().get("acl", ArtifactKind::Config).unwrap(), first_config);
        assert_eq!(
            materializer.store().get("ACL", ArtifactKind::SourceConstant).unwrap(),
            first_source
        );
        assert_eq!(materializer.store().writes(), 4);
    }

    #[test]
    fn test_materialize_replaces_previous_prediction() {
        let materializer = Materializer::new(MemoryArtifactStore::default());
        let names = ArtifactNames::derive("ACL");
        materializer.materialize("ACL", &names, &predict(DEPLOYER, 3)).unwrap();
        let latest = predict(DEPLOYER, 0);
        materializer.materialize("ACL", &names, &latest).unwrap();

        let config = materializer.store().get("acl", ArtifactKind::Config).unwrap().unwrap();
        assert_eq!(
            String::from_utf8(config).unwrap(),
            render_config(&names.config_key, latest.address)
        );
    }

    #[test]
    fn test_check_detects_stale_and_missing_artifacts() {
        let materializer = Materializer::new(MemoryArtifactStore::default());
        let names = ArtifactNames::derive("ACL");
        let current = predict(DEPLOYER, 0);

        let missing = materializer.check("ACL", &names, &current).unwrap_err();
        assert!(matches!(
            missing,
            PredeployError::StaleArtifact { ref found, .. } if found.is_empty()
        ));

        materializer.materialize("ACL", &names, &predict(DEPLOYER, 1)).unwrap();
        let stale = materializer.check("ACL", &names, &current).unwrap_err();
        assert!(matches!(
            stale,
            PredeployError::StaleArtifact { expected, .. } if expected == current.address
        ));

        materializer.materialize("ACL", &names, &current).unwrap();
        materializer.check("ACL", &names, &current).unwrap();
    }

    #[test]
    fn test_check_reads_the_source_constant() {
        let materializer = Materializer::new(MemoryArtifactStore::default());
        let names = ArtifactNames::derive("ACL").with_overrides(&NamingOverrides {
            constant_name: Some("aclAdd".to_string()),
            ..Default::default()
        });
        let current = predict(DEPLOYER, 0);
        materializer.materialize("ACL", &names, &current).unwrap();

        let tampered = render_source_constant("aclAdd", Address::repeat_byte(0xee));
        materializer
            .store()
            .put(&names.source_file, ArtifactKind::SourceConstant, tampered.as_bytes())
            .unwrap();

        let err = materializer.check("ACL", &names, &current).unwrap_err();
        match err {
            PredeployError::StaleArtifact { key, found, expected, .. } => {
                assert_eq!(key, "aclAdd");
                assert_eq!(found, Address::repeat_byte(0xee).to_string());
                assert_eq!(expected, current.address);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_check_rejects_half_written_set() {
        let store = MemoryArtifactStore::default();
        let names = ArtifactNames::derive("KMSVerifier");
        let old = predict(DEPLOYER, 2);
        let current = predict(DEPLOYER, 3);
        Materializer::new(&store).materialize("KMSVerifier", &names, &old).unwrap();
        // Only the config reached the new prediction.
        store
            .put(
                &names.config_file,
                ArtifactKind::Config,
                render_config(&names.config_key, current.address).as_bytes(),
            )
            .unwrap();

        let err = Materializer::new(&store).check("KMSVerifier", &names, &current).unwrap_err();
        assert!(matches!(
            err,
            PredeployError::StaleArtifact { ref key, .. } if key == &names.constant_name
        ));
    }

    #[test]
    fn test_check_rejects_edited_config() {
        let materializer = Materializer::new(MemoryArtifactStore::default());
        let names = ArtifactNames::derive("ACL");
        let current = predict(DEPLOYER, 0);
        materializer.materialize("ACL", &names, &current).unwrap();
        let edited = format!("{}# local\n", render_config(&names.config_key, current.address));
        materializer
            .store()
            .put(&names.config_file, ArtifactKind::Config, edited.as_bytes())
            .unwrap();

        let err = materializer.check("ACL", &names, &current).unwrap_err();
        assert!(matches!(
            err,
            PredeployError::StaleArtifact { ref key, .. } if key == &names.config_key
        ));
    }

    #[test]
    fn test_parse_source_constant() {
        let content = render_source_constant("aclAdd", Address::repeat_byte(0x11));
        assert_eq!(
            parse_source_constant(&content, "aclAdd"),
            Some(Address::repeat_byte(0x11).to_string())
        );
        assert_eq!(parse_source_constant(&content, "other"), None);
    }

    #[test]
    fn test_invalid_identifiers_are_rejected_before_writing() {
        let materializer = Materializer::new(MemoryArtifactStore::default());
        let names = ArtifactNames::derive("ACL")
            .with_overrides(&NamingOverrides {
                constant_name: Some("1acl".to_string()),
                ..Default::default()
            });
        let err = materializer.materialize("ACL", &names, &predict(DEPLOYER, 0)).unwrap_err();
        assert!(matches!(err, PredeployError::InvalidInput(_)));
        assert_eq!(materializer.store().writes(), 0);
    }

    #[test]
    fn test_parse_config_value() {
        let content = "# comment\nOTHER=1\nACL_CONTRACT_ADDRESS = 0xabc \n";
        assert_eq!(parse_config_value(content, "ACL_CONTRACT_ADDRESS").as_deref(), Some("0xabc"));
        assert_eq!(parse_config_value(content, "MISSING"), None);
    }
}
