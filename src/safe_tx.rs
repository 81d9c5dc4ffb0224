//! Safe transaction authorization digests
//!
//! Reproduces the multisig's EIP-712 hashing by hand:
//!
//! ```text
//! domainHash = keccak256(abi.encode(DOMAIN_TYPEHASH, [chainId,] safe))
//! structHash = keccak256(abi.encode(SAFE_TX_TYPEHASH, to, value, keccak256(data),
//!                                   operation, safeTxGas, baseGas, gasPrice,
//!                                   gasToken, refundReceiver, nonce))
//! digest     = keccak256(0x19 ‖ 0x01 ‖ domainHash ‖ structHash)
//! ```
//!
//! A co-signer re-derives the same digest independently, so every byte of the
//! layout above matters.

use alloy::primitives::{Address, Bytes, B256, U256};
use serde::{Deserialize, Serialize};

use crate::hash::{address_to_bytes32, keccak256, keccak256_concat, u256_to_bytes32};

/// keccak256("SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)")
pub const SAFE_TX_TYPEHASH: [u8; 32] = [
    0xbb, 0x83, 0x10, 0xd4, 0x86, 0x36, 0x8d, 0xb6, 0xbd, 0x6f, 0x84, 0x94, 0x02, 0xfd, 0xd7, 0x3a,
    0xd5, 0x3d, 0x31, 0x6b, 0x5a, 0x4b, 0x26, 0x44, 0xad, 0x6e, 0xfe, 0x0f, 0x94, 0x12, 0x86, 0xd8,
];

/// keccak256("EIP712Domain(uint256 chainId,address verifyingContract)")
pub const DOMAIN_SEPARATOR_TYPEHASH: [u8; 32] = [
    0x47, 0xe7, 0x95, 0x34, 0xa2, 0x45, 0x95, 0x2e, 0x8b, 0x16, 0x89, 0x3a, 0x33, 0x6b, 0x85, 0xa3,
    0xd9, 0xea, 0x9f, 0xa8, 0xc5, 0x73, 0xf3, 0xd8, 0x03, 0xaf, 0xb9, 0x2a, 0x79, 0x46, 0x92, 0x18,
];

/// Domain type used by Safe contracts before v1.3.0 (no chain id)
pub const LEGACY_DOMAIN_TYPE: &str = "EIP712Domain(address verifyingContract)";

/// EIP-191 prefix for structured data (version byte 0x01)
pub const TYPED_DATA_PREFIX: [u8; 2] = [0x19, 0x01];

/// How the domain separator binds the signature to a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeDomain {
    /// Safe address only (Safe < 1.3.0). Replayable across chains that share
    /// the same Safe address.
    Legacy,
    /// Chain id and Safe address (Safe >= 1.3.0)
    ChainBound { chain_id: u64 },
}

/// Safe operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum SafeOperation {
    #[default]
    Call,
    DelegateCall,
}

impl From<SafeOperation> for u8 {
    fn from(op: SafeOperation) -> Self {
        match op {
            SafeOperation::Call => 0,
            SafeOperation::DelegateCall => 1,
        }
    }
}

impl TryFrom<u8> for SafeOperation {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SafeOperation::Call),
            1 => Ok(SafeOperation::DelegateCall),
            other => Err(format!("invalid Safe operation {}", other)),
        }
    }
}

/// Refund parameters; all zero for relay-submitted transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GasParams {
    pub safe_tx_gas: U256,
    pub base_gas: U256,
    pub gas_price: U256,
    pub gas_token: Address,
    pub refund_receiver: Address,
}

/// Fields of a multisig-approved call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafeTransaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub operation: SafeOperation,
    pub gas: GasParams,
    pub nonce: U256,
}

impl SafeTransaction {
    /// A plain call with no value and no gas refund
    pub fn call(to: Address, data: Bytes, nonce: U256) -> Self {
        Self {
            to,
            value: U256::ZERO,
            data,
            operation: SafeOperation::Call,
            gas: GasParams::default(),
            nonce,
        }
    }
}

/// Domain separator for a Safe
pub fn domain_separator(safe: &Address, domain: SafeDomain) -> B256 {
    let safe_word = address_to_bytes32(safe);
    let hash = match domain {
        SafeDomain::Legacy => {
            let typehash = keccak256(LEGACY_DOMAIN_TYPE.as_bytes());
            keccak256_concat(&[&typehash, &safe_word])
        }
        SafeDomain::ChainBound { chain_id } => {
            let chain_word = u256_to_bytes32(&U256::from(chain_id));
            keccak256_concat(&[&DOMAIN_SEPARATOR_TYPEHASH, &chain_word, &safe_word])
        }
    };
    B256::from(hash)
}

/// Struct hash of the transaction fields
pub fn struct_hash(tx: &SafeTransaction) -> B256 {
    // abi.encode layout: 11 words * 32 bytes = 352 bytes
    let mut data = [0u8; 352];

    // Word 0: SAFE_TX_TYPEHASH
    data[0..32].copy_from_slice(&SAFE_TX_TYPEHASH);

    // Word 1: to
    data[32..64].copy_from_slice(&address_to_bytes32(&tx.to));

    // Word 2: value
    data[64..96].copy_from_slice(&u256_to_bytes32(&tx.value));

    // Word 3: keccak256(data), so the payload length never shifts the layout
    data[96..128].copy_from_slice(&keccak256(&tx.data));

    // Word 4: operation (uint8, right-aligned)
    data[159] = u8::from(tx.operation);

    // Words 5-7: safeTxGas, baseGas, gasPrice
    data[160..192].copy_from_slice(&u256_to_bytes32(&tx.gas.safe_tx_gas));
    data[192..224].copy_from_slice(&u256_to_bytes32(&tx.gas.base_gas));
    data[224..256].copy_from_slice(&u256_to_bytes32(&tx.gas.gas_price));

    // Words 8-9: gasToken, refundReceiver
    data[256..288].copy_from_slice(&address_to_bytes32(&tx.gas.gas_token));
    data[288..320].copy_from_slice(&address_to_bytes32(&tx.gas.refund_receiver));

    // Word 10: nonce
    data[320..352].copy_from_slice(&u256_to_bytes32(&tx.nonce));

    B256::from(keccak256(&data))
}

/// Digest the Safe owners sign to approve `tx`.
pub fn build_digest(safe: &Address, tx: &SafeTransaction, domain: SafeDomain) -> B256 {
    let domain_hash = domain_separator(safe, domain);
    let struct_hash = struct_hash(tx);
    B256::from(keccak256_concat(&[
        &TYPED_DATA_PREFIX,
        domain_hash.as_slice(),
        struct_hash.as_slice(),
    ]))
}

/// A fully built, signed Safe transaction proposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    pub safe: Address,
    pub tx: SafeTransaction,
    /// Digest the signature commits to (`contractTransactionHash`)
    pub digest: B256,
    /// `r ‖ s ‖ v`
    pub signature: [u8; 65],
    /// Owner that produced the signature
    pub sender: Address,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contracts::SafeTx;
    use alloy::sol_types::{eip712_domain, Eip712Domain, SolStruct};

    fn safe() -> Address {
        Address::repeat_byte(0x5a)
    }

    fn sample_tx() -> SafeTransaction {
        SafeTransaction::call(
            Address::repeat_byte(0xb7),
            Bytes::from(vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]),
            U256::from(12u64),
        )
    }

    fn as_sol(tx: &SafeTransaction) -> SafeTx {
        SafeTx {
            to: tx.to,
            value: tx.value,
            data: tx.data.clone(),
            operation: u8::from(tx.operation),
            safeTxGas: tx.gas.safe_tx_gas,
            baseGas: tx.gas.base_gas,
            gasPrice: tx.gas.gas_price,
            gasToken: tx.gas.gas_token,
            refundReceiver: tx.gas.refund_receiver,
            nonce: tx.nonce,
        }
    }

    #[test]
    fn test_typehashes() {
        assert_eq!(
            keccak256(
                b"SafeTx(address to,uint256 value,bytes data,uint8 operation,uint256 safeTxGas,uint256 baseGas,uint256 gasPrice,address gasToken,address refundReceiver,uint256 nonce)"
            ),
            SAFE_TX_TYPEHASH
        );
        assert_eq!(
            keccak256(b"EIP712Domain(uint256 chainId,address verifyingContract)"),
            DOMAIN_SEPARATOR_TYPEHASH
        );
    }

    #[test]
    fn test_struct_hash_matches_eip712_encoding() {
        let tx = sample_tx();
        assert_eq!(struct_hash(&tx), as_sol(&tx).eip712_hash_struct());
    }

    #[test]
    fn test_chain_bound_digest_matches_eip712_signing_hash() {
        let tx = sample_tx();
        let domain = eip712_domain! {
            chain_id: 11155111,
            verifying_contract: safe(),
        };
        let expected = as_sol(&tx).eip712_signing_hash(&domain);
        assert_eq!(
            build_digest(&safe(), &tx, SafeDomain::ChainBound { chain_id: 11155111 }),
            expected
        );
    }

    #[test]
    fn test_legacy_digest_matches_eip712_signing_hash() {
        let tx = sample_tx();
        let domain = Eip712Domain::new(None, None, None, Some(safe()), None);
        let expected = as_sol(&tx).eip712_signing_hash(&domain);
        assert_eq!(build_digest(&safe(), &tx, SafeDomain::Legacy), expected);
    }

    #[test]
    fn test_domains_differ() {
        let legacy = domain_separator(&safe(), SafeDomain::Legacy);
        let mainnet = domain_separator(&safe(), SafeDomain::ChainBound { chain_id: 1 });
        let sepolia = domain_separator(&safe(), SafeDomain::ChainBound { chain_id: 11155111 });
        assert_ne!(legacy, mainnet);
        assert_ne!(mainnet, sepolia);
        assert_ne!(
            mainnet,
            domain_separator(&Address::repeat_byte(0x5b), SafeDomain::ChainBound { chain_id: 1 })
        );
    }

    #[test]
    fn test_digest_is_deterministic() {
        let domain = SafeDomain::ChainBound { chain_id: 1 };
        assert_eq!(
            build_digest(&safe(), &sample_tx(), domain),
            build_digest(&safe(), &sample_tx(), domain)
        );
    }

    #[test]
    fn test_digest_sensitive_to_every_field() {
        let domain = SafeDomain::ChainBound { chain_id: 1 };
        let base = sample_tx();
        let base_digest = build_digest(&safe(), &base, domain);

        let mut variants = Vec::new();

        let mut tx = base.clone();
        tx.nonce = U256::from(13u64);
        variants.push(("nonce", tx));

        let mut tx = base.clone();
        tx.to = Address::repeat_byte(0xb8);
        variants.push(("to", tx));

        let mut tx = base.clone();
        tx.value = U256::from(1u64);
        variants.push(("value", tx));

        let mut tx = base.clone();
        tx.data = Bytes::from(vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x02]);
        variants.push(("data", tx));

        let mut tx = base.clone();
        tx.operation = SafeOperation::DelegateCall;
        variants.push(("operation", tx));

        let mut tx = base.clone();
        tx.gas.safe_tx_gas = U256::from(1u64);
        variants.push(("safe_tx_gas", tx));

        let mut tx = base.clone();
        tx.gas.base_gas = U256::from(1u64);
        variants.push(("base_gas", tx));

        let mut tx = base.clone();
        tx.gas.gas_price = U256::from(1u64);
        variants.push(("gas_price", tx));

        let mut tx = base.clone();
        tx.gas.gas_token = Address::repeat_byte(0x01);
        variants.push(("gas_token", tx));

        let mut tx = base.clone();
        tx.gas.refund_receiver = Address::repeat_byte(0x02);
        variants.push(("refund_receiver", tx));

        for (field, tx) in variants {
            assert_ne!(
                build_digest(&safe(), &tx, domain),
                base_digest,
                "changing {} must change the digest",
                field
            );
        }

        assert_ne!(build_digest(&Address::repeat_byte(0x5b), &base, domain), base_digest);
    }

    #[test]
    fn test_operation_serde_as_integer() {
        assert_eq!(serde_json::to_string(&SafeOperation::Call).unwrap(), "0");
        assert_eq!(
            serde_json::from_str::<SafeOperation>("1").unwrap(),
            SafeOperation::DelegateCall
        );
        assert!(serde_json::from_str::<SafeOperation>("2").is_err());
    }
}
