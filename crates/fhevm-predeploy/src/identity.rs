//! Deployer identities.

use std::{collections::BTreeMap, fmt};

use alloy_network::EthereumWallet;
use alloy_primitives::Address;
use alloy_signer_local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};

use crate::{PredeployError, Result};

/// The account that issues every transaction of one sequencing run, together with its key.
///
/// Nonce-based predictions only hold while this identity is the single writer; callers must not
/// share it with anything that sends transactions concurrently.
#[derive(Clone)]
pub struct DeployerIdentity {
    signer: PrivateKeySigner,
}

impl DeployerIdentity {
    /// Wraps an existing signer.
    pub const fn new(signer: PrivateKeySigner) -> Self {
        Self { signer }
    }

    /// Loads an identity from a hex-encoded private key (with or without `0x`).
    pub fn from_private_key(key: &str) -> Result<Self> {
        let signer = key
            .trim()
            .parse::<PrivateKeySigner>()
            .map_err(|e| PredeployError::InvalidInput(format!("Invalid private key: {e}")))?;
        Ok(Self::new(signer))
    }

    /// Derives the identity at `m/44'/60'/0'/0/{index}` from a BIP-39 seed phrase.
    pub fn from_mnemonic(phrase: &str, index: u32) -> Result<Self> {
        let signer = MnemonicBuilder::<English>::default()
            .phrase(phrase.trim())
            .index(index)
            .and_then(|builder| builder.build())
            .map_err(|e| {
                PredeployError::InvalidInput(format!(
                    "Failed to derive account {index} from mnemonic: {e}"
                ))
            })?;
        Ok(Self::new(signer))
    }

    /// The deployer address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// The underlying signer.
    pub const fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// A wallet that signs with this identity's key.
    pub fn wallet(&self) -> EthereumWallet {
        EthereumWallet::from(self.signer.clone())
    }
}

impl fmt::Debug for DeployerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeployerIdentity").field("address", &self.address()).finish_non_exhaustive()
    }
}

/// Identities keyed by the slot a plan stage refers to.
#[derive(Debug, Clone, Default)]
pub struct IdentitySet {
    identities: BTreeMap<u32, DeployerIdentity>,
}

impl IdentitySet {
    /// Derives one identity per slot from a seed phrase; slot `n` is account index `n`.
    pub fn from_mnemonic(phrase: &str, slots: impl IntoIterator<Item = u32>) -> Result<Self> {
        let mut identities = BTreeMap::new();
        for slot in slots {
            identities.insert(slot, DeployerIdentity::from_mnemonic(phrase, slot)?);
        }
        Ok(Self { identities })
    }

    /// Uses the given private keys; the `n`-th key fills slot `n`.
    pub fn from_private_keys<S: AsRef<str>>(keys: &[S]) -> Result<Self> {
        let mut identities = BTreeMap::new();
        for (slot, key) in keys.iter().enumerate() {
            let slot = u32::try_from(slot)
                .map_err(|_| PredeployError::InvalidInput("Too many private keys".to_string()))?;
            identities.insert(slot, DeployerIdentity::from_private_key(key.as_ref())?);
        }
        Ok(Self { identities })
    }

    /// Adds or replaces the identity in `slot`.
    pub fn insert(&mut self, slot: u32, identity: DeployerIdentity) {
        self.identities.insert(slot, identity);
    }

    /// Returns the identity in `slot`, failing with [`PredeployError::InvalidInput`] if none.
    pub fn get(&self, slot: u32) -> Result<&DeployerIdentity> {
        self.identities.get(&slot).ok_or_else(|| {
            PredeployError::InvalidInput(format!("No deployer identity configured for slot {slot}"))
        })
    }

    /// The address of every configured slot.
    pub fn addresses(&self) -> BTreeMap<u32, Address> {
        self.identities.iter().map(|(slot, identity)| (*slot, identity.address())).collect()
    }
}
