use crate::{DeployerIdentity, IdentitySet};

/// The development seed phrase shared by Hardhat, Anvil and the fhEVM dev node.
pub const TEST_MNEMONIC: &str = "test test test test test test test test test test test junk";

/// Private key of development account 0, `0xf39F…2266`.
pub const ACCOUNT_0_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// Private key of development account 1, `0x7099…79C8`.
pub const ACCOUNT_1_KEY: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Development accounts 0 and 1 in slots 0 and 1.
pub fn hardhat_identities() -> IdentitySet {
    let mut identities = IdentitySet::default();
    identities.insert(0, DeployerIdentity::from_private_key(ACCOUNT_0_KEY).unwrap());
    identities.insert(1, DeployerIdentity::from_private_key(ACCOUNT_1_KEY).unwrap());
    identities
}
