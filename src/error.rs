//! Error types for the bridge authorization pipeline
//!
//! Every pure stage returns [`BridgeError`] to its immediate caller. The only
//! non-fatal condition is [`DecodeWarning`], which the log scanner records for
//! a single skipped log while the rest of the scan continues.

use alloy::primitives::{B256, U256};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    // ========================================================================
    // Configuration / Fee Errors
    // ========================================================================

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Insufficient amount: {reason}")]
    InsufficientAmount { reason: String },

    #[error("Unknown token: {0}")]
    UnknownToken(String),

    // ========================================================================
    // Authorization Pipeline Errors
    // ========================================================================

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Signing error: {0}")]
    Signing(String),

    // ========================================================================
    // Native Ledger Entry Errors
    // ========================================================================

    #[error("Malformed entry: {0}")]
    MalformedEntry(String),

    #[error("Unsupported entry version: expected {expected:?}, found {found:?}")]
    UnsupportedVersion { expected: String, found: String },

    // ========================================================================
    // Collaborator Errors
    // ========================================================================

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Safe transaction service rejected the request: {}", .0.join("; "))]
    SafeApiRejected(Vec<String>),

    // ========================================================================
    // Duplicate Protection
    // ========================================================================

    /// A queued Safe transaction already carries this deposit's mint call
    #[error("Deposit {deposit} already proposed at Safe nonce {nonce}")]
    AlreadyProposed { deposit: String, nonce: U256 },

    /// The release went through but the burn record did not; only the record
    /// may be retried
    #[error("Burn {burn} released as {ledger_tx} but not recorded: {reason}")]
    ReleaseUnrecorded {
        burn: String,
        ledger_tx: String,
        reason: String,
    },
}

impl BridgeError {
    /// Wrap an adapter failure, keeping the full eyre context chain.
    pub fn transport(err: eyre::Report) -> Self {
        BridgeError::Transport(format!("{:#}", err))
    }

    pub fn insufficient(reason: impl Into<String>) -> Self {
        BridgeError::InsufficientAmount {
            reason: reason.into(),
        }
    }

    /// Whether the same operation may succeed on a later attempt.
    ///
    /// Collaborator failures are retryable; everything derived from the
    /// operation's own data fails the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BridgeError::Transport(_) | BridgeError::SafeApiRejected(_)
        )
    }
}

/// A log skipped during scanning because its payload did not decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodeWarning {
    pub block_number: Option<u64>,
    pub tx_hash: Option<B256>,
    pub log_index: Option<u64>,
    pub reason: String,
}
