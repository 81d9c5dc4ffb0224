//! Event extraction
//!
//! Two sources feed the release flow:
//! - [`logs`]: burn logs scanned from the bridge contract on the EVM chain
//! - [`entry`]: burn records stored as data entries on the native ledger

pub mod entry;
pub mod logs;

pub use entry::{parse_entry, to_entry, ENTRY_VERSION};
pub use logs::{IntoBurn, LogScanner, ScanReport};
