//! Hashing and word-packing helpers
//!
//! Keccak-256 plus the 32-byte word conversions used when reproducing
//! `abi.encode` layouts by hand.

use alloy::primitives::{Address, U256};
use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Keccak256 over several slices without concatenating them first
pub fn keccak256_concat(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    for part in parts {
        hasher.update(part);
    }
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// First four bytes of keccak256(signature), as used for method selectors
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Convert an EVM address to bytes32 (left-padded with zeros)
pub fn address_to_bytes32(addr: &Address) -> [u8; 32] {
    let mut result = [0u8; 32];
    result[12..32].copy_from_slice(addr.as_slice());
    result
}

/// Big-endian 32-byte word for a uint256
pub fn u256_to_bytes32(value: &U256) -> [u8; 32] {
    value.to_be_bytes::<32>()
}

/// Convert bytes to hex string with 0x prefix
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode a hex string with or without a 0x prefix
pub fn decode_hex(value: &str) -> Result<Vec<u8>, hex::FromHexError> {
    hex::decode(value.strip_prefix("0x").unwrap_or(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak256() {
        let result = keccak256(b"hello");
        assert_eq!(
            bytes32_to_hex(&result),
            "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    #[test]
    fn test_keccak256_concat_matches_single_pass() {
        assert_eq!(keccak256_concat(&[b"hel", b"", b"lo"]), keccak256(b"hello"));
    }

    #[test]
    fn test_selector_transfer() {
        // ERC20 transfer(address,uint256)
        assert_eq!(selector("transfer(address,uint256)"), [0xa9, 0x05, 0x9c, 0xbb]);
    }

    #[test]
    fn test_address_to_bytes32() {
        let addr = Address::repeat_byte(0xab);
        let word = address_to_bytes32(&addr);
        assert_eq!(&word[..12], &[0u8; 12]);
        assert_eq!(&word[12..], addr.as_slice());
    }

    #[test]
    fn test_u256_to_bytes32() {
        let word = u256_to_bytes32(&U256::from(0x0102u64));
        assert_eq!(word[30], 0x01);
        assert_eq!(word[31], 0x02);
        assert!(word[..30].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_decode_hex_prefix_optional() {
        assert_eq!(decode_hex("0xdead").unwrap(), vec![0xde, 0xad]);
        assert_eq!(decode_hex("dead").unwrap(), vec![0xde, 0xad]);
        assert!(decode_hex("0xzz").is_err());
    }
}
