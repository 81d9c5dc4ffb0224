//! EVM log scanner
//!
//! Queries the logs of one typed event for a block range and decodes them.
//! A log whose payload does not decode is skipped with a warning; the rest of
//! the range is still returned.

use alloy::primitives::{Address, B256};
use alloy::sol_types::SolEvent;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::contracts::Bridge;
use crate::error::{BridgeError, DecodeWarning};
use crate::transport::{EvmRpc, RawLog};
use crate::types::{BlockRange, BurnEvent};

/// Default maximum number of blocks per `eth_getLogs` call
pub const DEFAULT_MAX_BLOCK_RANGE: u64 = 10_000;

/// Events that normalize into a [`BurnEvent`]
///
/// The transaction id and block height come from the log envelope, never from
/// the decoded payload.
pub trait IntoBurn: SolEvent {
    fn into_burn(self, block_height: u64, tx_hash: B256) -> BurnEvent;
}

impl IntoBurn for Bridge::Burn {
    fn into_burn(self, block_height: u64, tx_hash: B256) -> BurnEvent {
        BurnEvent {
            tx_id: format!("{:#x}", tx_hash),
            block_height,
            token: self.token,
            amount: self.amount,
            destination: self.destination,
            tx_hash,
        }
    }
}

/// Result of a scan: decoded events plus the logs that were skipped
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub events: Vec<BurnEvent>,
    pub skipped: Vec<DecodeWarning>,
}

impl ScanReport {
    fn merge(&mut self, other: ScanReport) {
        self.events.extend(other.events);
        self.skipped.extend(other.skipped);
    }
}

/// Scans a contract's logs for one event type
#[derive(Clone)]
pub struct LogScanner {
    rpc: Arc<dyn EvmRpc>,
    max_block_range: u64,
}

impl LogScanner {
    pub fn new(rpc: Arc<dyn EvmRpc>) -> Self {
        Self {
            rpc,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
        }
    }

    pub fn with_max_block_range(mut self, max_block_range: u64) -> Self {
        self.max_block_range = max_block_range.max(1);
        self
    }

    /// Scan `contract` for `E` logs in `range`.
    ///
    /// An open upper bound is resolved to the latest block first so the range
    /// can be chunked. Chunks are queried in ascending order.
    pub async fn scan<E: IntoBurn>(
        &self,
        contract: Address,
        range: BlockRange,
    ) -> Result<ScanReport, BridgeError> {
        let topic = E::SIGNATURE_HASH;

        let bounded = match range.to {
            Some(_) => range,
            None => {
                let latest = self
                    .rpc
                    .latest_block()
                    .await
                    .map_err(BridgeError::transport)?;
                BlockRange {
                    from: range.from,
                    to: Some(latest),
                }
            }
        };

        let mut report = ScanReport::default();
        if bounded.to.is_some_and(|to| to < bounded.start()) {
            return Ok(report);
        }

        for chunk in bounded.chunks(self.max_block_range) {
            let logs = self
                .rpc
                .query_logs(contract, topic, chunk)
                .await
                .map_err(BridgeError::transport)?;

            debug!(
                event = E::SIGNATURE,
                contract = %contract,
                range = %chunk,
                logs = logs.len(),
                "Scanning logs"
            );

            report.merge(decode_logs::<E>(contract, topic, &logs));
        }

        Ok(report)
    }
}

/// Decode a batch of logs, skipping (and recording) the ones that fail.
pub fn decode_logs<E: IntoBurn>(contract: Address, topic: B256, logs: &[RawLog]) -> ScanReport {
    let mut report = ScanReport::default();

    for log in logs {
        match decode_log::<E>(contract, topic, log) {
            Ok(event) => report.events.push(event),
            Err(reason) => {
                let warning = DecodeWarning {
                    block_number: log.block_number,
                    tx_hash: log.transaction_hash,
                    log_index: log.log_index,
                    reason,
                };
                warn!(
                    event = E::SIGNATURE,
                    block = ?warning.block_number,
                    tx_hash = ?warning.tx_hash,
                    log_index = ?warning.log_index,
                    reason = %warning.reason,
                    "Skipping undecodable log"
                );
                report.skipped.push(warning);
            }
        }
    }

    report
}

fn decode_log<E: IntoBurn>(contract: Address, topic: B256, log: &RawLog) -> Result<BurnEvent, String> {
    if log.address != contract {
        return Err(format!("log emitted by {} instead of {}", log.address, contract));
    }
    match log.topics.first() {
        Some(first) if *first == topic => {}
        Some(first) => return Err(format!("unexpected topic0 {}", first)),
        None => return Err("log has no topics".to_string()),
    }

    let block_height = log
        .block_number
        .ok_or_else(|| "missing block number".to_string())?;
    let tx_hash = log
        .transaction_hash
        .ok_or_else(|| "missing transaction hash".to_string())?;

    let event = E::decode_raw_log(log.topics.iter().copied(), &log.data, true)
        .map_err(|e| format!("payload decode failed: {}", e))?;

    Ok(event.into_burn(block_height, tx_hash))
}
