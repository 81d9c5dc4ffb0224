//! Native-ledger burn entries
//!
//! A recorded burn is a data entry with two hex-encoded fields:
//! 0. the version tag (`burn-v1`)
//! 1. the JSON-serialized [`BurnEvent`]
//!
//! Entries are handled one at a time, so every problem is an error rather
//! than a skip.

use crate::error::BridgeError;
use crate::hash::decode_hex;
use crate::types::{BurnEvent, DataEntry};

/// Version tag carried in field 0
pub const ENTRY_VERSION: &str = "burn-v1";

/// Parse a burn record from a native-ledger data entry.
pub fn parse_entry(entry: &DataEntry) -> Result<BurnEvent, BridgeError> {
    if entry.data.len() < 2 {
        return Err(BridgeError::MalformedEntry(format!(
            "expected at least 2 data fields, found {}",
            entry.data.len()
        )));
    }

    let found = match decode_hex(&entry.data[0]) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => entry.data[0].clone(),
    };
    if found != ENTRY_VERSION {
        return Err(BridgeError::UnsupportedVersion {
            expected: ENTRY_VERSION.to_string(),
            found,
        });
    }

    let payload = decode_hex(&entry.data[1])
        .map_err(|e| BridgeError::MalformedEntry(format!("field 1 is not hex: {}", e)))?;
    serde_json::from_slice(&payload)
        .map_err(|e| BridgeError::MalformedEntry(format!("field 1 is not a burn record: {}", e)))
}

/// Build the data entry recording `burn`, in the form [`parse_entry`] reads.
pub fn to_entry(burn: &BurnEvent) -> Result<DataEntry, BridgeError> {
    let payload = serde_json::to_vec(burn)
        .map_err(|e| BridgeError::Encoding(format!("failed to serialize burn record: {}", e)))?;
    Ok(DataEntry {
        data: vec![hex::encode(ENTRY_VERSION), hex::encode(payload)],
    })
}
