//! Deterministic CREATE address prediction.

use std::str::FromStr;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{PredeployError, Result};

/// An address computed before the contract it names exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PredictedAddress {
    /// The account that will issue the deployment
    pub deployer: Address,
    /// The deployer's transaction count at deployment time
    pub nonce: u64,
    /// The resulting contract address
    pub address: Address,
}

/// Predicts the address of a plain (non-factory, non-salted) deployment issued from `deployer`
/// at transaction count `nonce`.
///
/// This is the ledger's CREATE rule, `keccak256(rlp([deployer, nonce]))[12..]`.
pub fn predict(deployer: Address, nonce: u64) -> PredictedAddress {
    PredictedAddress { deployer, nonce, address: deployer.create(nonce) }
}

/// Same as [`predict`], for untrusted string inputs.
///
/// The nonce accepts decimal or `0x`-prefixed hex; negative or non-numeric values are rejected.
pub fn predict_str(deployer: &str, nonce: &str) -> Result<PredictedAddress> {
    let deployer = Address::from_str(deployer.trim()).map_err(|e| {
        PredeployError::InvalidInput(format!("Invalid deployer address '{deployer}': {e}"))
    })?;
    Ok(predict(deployer, parse_nonce(nonce)?))
}

/// Parses a nonce given as decimal or `0x`-prefixed hex.
pub fn parse_nonce(s: &str) -> Result<u64> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else {
        s.parse::<u64>()
    };
    parsed.map_err(|e| PredeployError::InvalidInput(format!("Invalid nonce '{s}': {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, keccak256};
    use alloy_rlp::Encodable;
    use rstest::rstest;

    /// Hardhat account #0, whose first deployments are well known.
    const HARDHAT_0: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

    #[rstest]
    #[case(0, address!("5FbDB2315678afecb367f032d93F642f64180aa3"))]
    #[case(1, address!("e7f1725E7734CE288F8367e1Bb143E90bb3F0512"))]
    #[case(2, address!("9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0"))]
    #[case(5, address!("5FC8d32690cc91D4c39d9d3abcBD16989F875707"))]
    #[case(7, address!("a513E6E4b8f2a923D98304ec87F64353C4D5C853"))]
    fn test_predict_known_deployments(#[case] nonce: u64, #[case] expected: Address) {
        let predicted = predict(HARDHAT_0, nonce);
        assert_eq!(predicted.address, expected);
        assert_eq!(predicted.deployer, HARDHAT_0);
        assert_eq!(predicted.nonce, nonce);
    }

    #[test]
    fn test_predict_create2_factory_deployer() {
        // The canonical CREATE2 factory lands at nonce 0 of its keyless signer.
        let predicted = predict(address!("3fab184622dc19b6109349b94811493bf2a45362"), 0);
        assert_eq!(predicted.address, address!("4e59b44847b379578588920ca78fbf26c0b4956c"));
    }

    #[test]
    fn test_predict_matches_rlp_derivation() {
        for nonce in [0u64, 1, 0x7f, 0x80, 0xff, 0x100, 1 << 32, u64::MAX] {
            let mut out = Vec::new();
            alloy_rlp::Header { list: true, payload_length: HARDHAT_0.length() + nonce.length() }
                .encode(&mut out);
            HARDHAT_0.encode(&mut out);
            nonce.encode(&mut out);
            let expected = Address::from_slice(&keccak256(&out)[12..]);
            assert_eq!(predict(HARDHAT_0, nonce).address, expected, "nonce {nonce}");
        }
    }

    #[test]
    fn test_predict_is_deterministic() {
        let first = predict(HARDHAT_0, 42);
        for _ in 0..16 {
            assert_eq!(predict(HARDHAT_0, 42), first);
        }
        assert_ne!(predict(HARDHAT_0, 43).address, first.address);
    }

    #[rstest]
    #[case("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266", "5")]
    #[case("f39fd6e51aad88f6f4ce6ab8827279cfffb92266", "0x5")]
    #[case(" 0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266 ", " 5 ")]
    fn test_predict_str_accepts_valid_input(#[case] deployer: &str, #[case] nonce: &str) {
        assert_eq!(predict_str(deployer, nonce).unwrap(), predict(HARDHAT_0, 5));
    }

    #[rstest]
    #[case("0x1234", "0")]
    #[case("not an address", "0")]
    #[case("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266", "-1")]
    #[case("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266", "five")]
    #[case("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266", "")]
    fn test_predict_str_rejects_invalid_input(#[case] deployer: &str, #[case] nonce: &str) {
        assert!(matches!(predict_str(deployer, nonce), Err(PredeployError::InvalidInput(_))));
    }
}
