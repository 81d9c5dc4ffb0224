//! Digest signer for Safe owner approvals
//!
//! Produces the 65-byte `r ‖ s ‖ v` form the Safe transaction service expects,
//! with `v` in {27, 28}.

use alloy::primitives::{Address, B256};
use alloy::signers::local::PrivateKeySigner;
use k256::ecdsa::RecoveryId;
use tracing::warn;

use crate::error::BridgeError;

/// Offset added to a raw secp256k1 recovery id
pub const RECOVERY_ID_OFFSET: u8 = 27;

/// Signs authorization digests with a single Safe owner key
#[derive(Clone)]
pub struct SafeSigner {
    inner: PrivateKeySigner,
}

impl SafeSigner {
    /// Parse a hex private key (with or without 0x).
    pub fn from_private_key(private_key: &str) -> Result<Self, BridgeError> {
        let inner: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| BridgeError::Signing(format!("invalid private key: {}", e)))?;
        Ok(Self { inner })
    }

    pub fn new(inner: PrivateKeySigner) -> Self {
        Self { inner }
    }

    /// EVM address of the owner key
    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Sign a 32-byte digest as-is (no additional prefixing).
    ///
    /// The nonce is derived deterministically (RFC 6979), so the same digest
    /// and key always produce the same signature.
    pub fn sign(&self, digest: &B256) -> Result<[u8; 65], BridgeError> {
        let (signature, recovery_id) = self
            .inner
            .credential()
            .sign_prehash_recoverable(digest.as_slice())
            .map_err(|e| BridgeError::Signing(e.to_string()))?;

        let mut out = [0u8; 65];
        out[..64].copy_from_slice(&signature.to_bytes());
        out[64] = normalize_recovery_id(recovery_id.to_byte());
        Ok(out)
    }
}

impl std::fmt::Debug for SafeSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafeSigner")
            .field("address", &self.address())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Map a raw recovery id to the Ethereum `v` value.
///
/// 0 and 1 become 27 and 28; anything else is passed through unchanged.
pub fn normalize_recovery_id(raw: u8) -> u8 {
    if raw <= 1 {
        raw + RECOVERY_ID_OFFSET
    } else {
        warn!(recovery_id = raw, "Unexpected recovery id, passing through");
        raw
    }
}

/// Inverse of [`normalize_recovery_id`] for verification paths
pub fn recovery_id_from_v(v: u8) -> Option<RecoveryId> {
    let raw = if v >= RECOVERY_ID_OFFSET { v - RECOVERY_ID_OFFSET } else { v };
    RecoveryId::from_byte(raw)
}
