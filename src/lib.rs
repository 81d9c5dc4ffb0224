//! Safe Bridge relay library
//!
//! Moves value between a native ledger and an EVM chain. Mints on the EVM side
//! are proposed as Safe multisig transactions; burns observed on the EVM side
//! are released on the native ledger.
//!
//! ## Modules
//!
//! - `fees`: exact amount conversion between ledger precisions
//! - `encoder`: call data for the bridge contract
//! - `safe_tx`: Safe EIP-712 transaction digests
//! - `signer`: owner signatures over those digests
//! - `events`: burn extraction from EVM logs and ledger entries
//! - `orchestrator`: the mint and release flows
//! - `watcher`: the polling loop driving both flows
//! - `metrics`: Prometheus counters for the loop

pub mod bounded_cache;
pub mod config;
pub mod contracts;
pub mod encoder;
pub mod error;
pub mod events;
pub mod fees;
pub mod hash;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod redact;
pub mod registry;
pub mod safe_api;
pub mod safe_tx;
pub mod signer;
pub mod transport;
pub mod types;
pub mod watcher;

pub use error::{BridgeError, DecodeWarning};
pub use orchestrator::{Relay, RelaySettings};
pub use types::*;
