//! Common types for cross-chain operations
//!
//! Shared by the fee engine, the event extractors and the relay flows.

use alloy::primitives::{Address, B256, U256};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Token Registry Entries
// ============================================================================

/// A bridged token as loaded from the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// Token URL on the native ledger (e.g. "acc://bridge.acme/tokens/wbtc")
    pub url: String,
    /// Display symbol
    pub symbol: String,
    /// Decimal precision on the native ledger
    pub precision: u8,
    /// Wrapped token contract on the EVM chain
    pub evm_address: Address,
    /// ERC20 decimals of the wrapped token
    pub evm_decimals: u8,
    /// Per-mint operational cost in whole native-ledger units (may be fractional)
    pub operational_cost: BigDecimal,
}

// ============================================================================
// Fee Schedule
// ============================================================================

/// Basis-point denominator (1 bp = 0.01%)
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Bridge fees charged per direction, in basis points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub mint_fee_bps: u32,
    pub burn_fee_bps: u32,
}

impl FeeSchedule {
    pub fn new(mint_fee_bps: u32, burn_fee_bps: u32) -> Self {
        Self {
            mint_fee_bps,
            burn_fee_bps,
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Direction of an amount conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationKind {
    /// Native ledger -> EVM (wrapped tokens are minted)
    Mint,
    /// EVM -> native ledger (wrapped tokens were burned)
    Release,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Mint => "mint",
            OperationKind::Release => "release",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An in-flight amount conversion
///
/// `input` is in smallest units of the source side; `output` is filled in by
/// the fee engine in smallest units of the destination side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    pub kind: OperationKind,
    pub token: Token,
    pub input: U256,
    pub output: U256,
}

impl Operation {
    pub fn mint(token: Token, input: U256) -> Self {
        Self {
            kind: OperationKind::Mint,
            token,
            input,
            output: U256::ZERO,
        }
    }

    pub fn release(token: Token, input: U256) -> Self {
        Self {
            kind: OperationKind::Release,
            token,
            input,
            output: U256::ZERO,
        }
    }
}

// ============================================================================
// Chain Events
// ============================================================================

/// A value-destroying event on the EVM chain, normalized for the release flow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BurnEvent {
    /// Source transaction id (0x-prefixed hash for EVM logs)
    pub tx_id: String,
    /// Block height the burn was included in
    pub block_height: u64,
    /// Wrapped token contract that was burned
    pub token: Address,
    /// Burned amount in EVM smallest units
    pub amount: U256,
    /// Destination account URL on the native ledger
    pub destination: String,
    /// Raw transaction hash
    pub tx_hash: B256,
}

/// A lock on the native ledger awaiting a mint on the EVM chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deposit {
    /// Native ledger transaction id of the lock
    pub tx_id: String,
    /// Token URL on the native ledger
    pub token_url: String,
    /// Locked amount in native-ledger smallest units
    pub amount: U256,
    /// EVM recipient of the wrapped tokens
    pub recipient: Address,
}

/// Output of the release flow, handed to the native-ledger client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInstruction {
    pub token_url: String,
    pub destination: String,
    /// Amount in native-ledger smallest units
    pub amount: U256,
    pub burn_tx_hash: B256,
}

/// Raw data entry from the native ledger: a list of hex-encoded fields
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataEntry {
    pub data: Vec<String>,
}

// ============================================================================
// Block Ranges
// ============================================================================

/// Inclusive block range for log queries
///
/// `from: None` (or `Some(0)`) means genesis, `to: None` means latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockRange {
    pub from: Option<u64>,
    pub to: Option<u64>,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Everything from genesis to latest
    pub fn unbounded() -> Self {
        Self::default()
    }

    /// Lower bound with genesis folded to 0
    pub fn start(&self) -> u64 {
        self.from.unwrap_or(0)
    }

    /// Split a bounded range into inclusive chunks of at most `max_span` blocks.
    ///
    /// Ranges with an open upper bound are returned unchanged.
    pub fn chunks(&self, max_span: u64) -> Vec<BlockRange> {
        let Some(end) = self.to else {
            return vec![*self];
        };
        let max_span = max_span.max(1);
        let mut chunks = Vec::new();
        let mut current = self.start();
        while current <= end {
            let chunk_end = current.saturating_add(max_span - 1).min(end);
            chunks.push(BlockRange::new(current, chunk_end));
            if chunk_end == u64::MAX {
                break;
            }
            current = chunk_end + 1;
        }
        chunks
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.from, self.to) {
            (from, Some(to)) => write!(f, "[{}, {}]", from.unwrap_or(0), to),
            (from, None) => write!(f, "[{}, latest]", from.unwrap_or(0)),
        }
    }
}
