//! Relay loop
//!
//! Each tick:
//! 1. scans confirmed blocks for bridge burns and releases the new ones
//! 2. proposes a mint for every pending native-ledger deposit
//!
//! Failures of a single operation are logged and do not stop the tick. The
//! scan cursor only advances once every burn in the scanned range has been
//! released or failed permanently, so transient failures are retried on the
//! next tick. A burn that was released but not recorded is never released
//! again; only its record is retried.
//!
//! Deposits stay in the proposed set for as long as the ledger lists them as
//! pending. Across restarts the relay's queue check against the Safe service
//! keeps them from being proposed twice.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::B256;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::bounded_cache::{BoundedCache, DEFAULT_TTL_SECS};
use crate::contracts::Bridge;
use crate::error::BridgeError;
use crate::events::logs::DEFAULT_MAX_BLOCK_RANGE;
use crate::events::{parse_entry, LogScanner};
use crate::metrics;
use crate::orchestrator::Relay;
use crate::types::{BlockRange, BurnEvent};

/// Configuration for the relay loop
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Poll interval between ticks
    pub poll_interval: Duration,
    /// Number of confirmations before a block is scanned
    pub confirmations: u64,
    /// Maximum block range per log query
    pub max_block_range: u64,
    /// First block to scan; `None` starts at the confirmed head
    pub start_block: Option<u64>,
    /// Capacity of the in-memory burn dedupe cache
    pub dedupe_cache_size: usize,
    pub dedupe_ttl: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            confirmations: 1,
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            start_block: None,
            dedupe_cache_size: 10_000,
            dedupe_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickSummary {
    pub scanned: Option<BlockRange>,
    pub released: usize,
    pub minted: usize,
    pub recorded: usize,
    pub skipped_logs: usize,
    pub failed: usize,
}

pub struct RelayWatcher {
    relay: Arc<Relay>,
    scanner: LogScanner,
    config: WatcherConfig,
    /// Next block to scan
    cursor: Option<u64>,
    /// Burns released (or permanently rejected) during this run
    handled_burns: BoundedCache<B256>,
    /// Burns released but not yet recorded on the ledger
    unrecorded: HashMap<B256, BurnEvent>,
    /// Deposits proposed (or permanently rejected) that are still pending
    handled_deposits: HashSet<String>,
}

impl RelayWatcher {
    pub fn new(relay: Arc<Relay>, config: WatcherConfig) -> Self {
        let scanner = LogScanner::new(relay.rpc()).with_max_block_range(config.max_block_range);
        Self {
            handled_burns: BoundedCache::new(config.dedupe_cache_size, config.dedupe_ttl),
            unrecorded: HashMap::new(),
            handled_deposits: HashSet::new(),
            cursor: config.start_block,
            relay,
            scanner,
            config,
        }
    }

    /// Next block the watcher will scan, once known
    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Number of released burns still waiting for their ledger record
    pub fn unrecorded(&self) -> usize {
        self.unrecorded.len()
    }

    /// Main run loop
    pub async fn run(&mut self, mut shutdown: mpsc::Receiver<()>) -> eyre::Result<()> {
        info!(
            bridge = %self.relay.settings().bridge,
            safe = %self.relay.settings().safe,
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            "Relay watcher starting"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
                _ = tokio::time::sleep(self.config.poll_interval) => {
                    match self.tick().await {
                        Ok(summary) => debug!(?summary, "Tick complete"),
                        Err(e) => error!(error = %e, "Tick failed"),
                    }
                }
            }
        }

        Ok(())
    }

    /// Run the burn and deposit passes once.
    pub async fn tick(&mut self) -> Result<TickSummary, BridgeError> {
        let mut summary = TickSummary::default();
        self.record_released_burns(&mut summary).await;
        self.process_burns(&mut summary).await?;
        self.process_deposits(&mut summary).await?;
        Ok(summary)
    }

    async fn process_burns(&mut self, summary: &mut TickSummary) -> Result<(), BridgeError> {
        let latest = self
            .relay
            .rpc()
            .latest_block()
            .await
            .map_err(BridgeError::transport)?;
        let head = latest.saturating_sub(self.config.confirmations);
        let from = *self.cursor.get_or_insert(head);

        if from > head {
            debug!(from, head, "No new confirmed blocks");
            return Ok(());
        }

        let range = BlockRange::new(from, head);
        let report = self
            .scanner
            .scan::<Bridge::Burn>(self.relay.settings().bridge, range)
            .await?;
        summary.scanned = Some(range);
        summary.skipped_logs = report.skipped.len();

        let recorded = if report.events.is_empty() {
            HashSet::new()
        } else {
            self.recorded_burns().await?
        };

        let mut retry_range = false;
        for burn in &report.events {
            if recorded.contains(&burn.tx_hash)
                || self.handled_burns.contains(&burn.tx_hash)
                || self.unrecorded.contains_key(&burn.tx_hash)
            {
                debug!(burn = %burn.tx_id, "Burn already released");
                continue;
            }

            match self.relay.release(burn).await {
                Ok(_) => {
                    self.handled_burns.insert(burn.tx_hash);
                    summary.released += 1;
                    metrics::record_release("released");
                }
                Err(e @ BridgeError::ReleaseUnrecorded { .. }) => {
                    self.handled_burns.insert(burn.tx_hash);
                    self.unrecorded.insert(burn.tx_hash, burn.clone());
                    summary.released += 1;
                    summary.failed += 1;
                    metrics::record_release("unrecorded");
                    warn!(burn = %burn.tx_id, error = %e, "Burn record queued for retry");
                }
                Err(e) => {
                    summary.failed += 1;
                    metrics::record_release("failed");
                    if e.is_retryable() {
                        retry_range = true;
                    } else {
                        self.handled_burns.insert(burn.tx_hash);
                    }
                    error!(
                        burn = %burn.tx_id,
                        block = burn.block_height,
                        retryable = e.is_retryable(),
                        error = %e,
                        "Release failed"
                    );
                }
            }
        }

        if !retry_range {
            self.cursor = Some(head + 1);
            metrics::record_blocks_scanned(head - from + 1, head + 1);
        }
        metrics::record_logs_skipped(report.skipped.len());

        info!(
            range = %range,
            burns = report.events.len(),
            released = summary.released,
            skipped_logs = summary.skipped_logs,
            "Burn scan complete"
        );
        Ok(())
    }

    /// Retry the ledger record of burns released on an earlier tick
    async fn record_released_burns(&mut self, summary: &mut TickSummary) {
        let pending: Vec<BurnEvent> = self.unrecorded.values().cloned().collect();
        for burn in pending {
            match self.relay.record_burn(&burn).await {
                Ok(()) => {
                    self.unrecorded.remove(&burn.tx_hash);
                    summary.recorded += 1;
                    metrics::record_release("recorded");
                }
                Err(e) => error!(burn = %burn.tx_id, error = %e, "Burn record retry failed"),
            }
        }
    }

    /// Burn tx hashes already recorded on the ledger
    async fn recorded_burns(&self) -> Result<HashSet<B256>, BridgeError> {
        let entries = self
            .relay
            .ledger()
            .burn_entries()
            .await
            .map_err(BridgeError::transport)?;

        let mut recorded = HashSet::with_capacity(entries.len());
        for entry in &entries {
            match parse_entry(entry) {
                Ok(burn) => {
                    recorded.insert(burn.tx_hash);
                }
                Err(e) => warn!(error = %e, "Ignoring unreadable burn entry"),
            }
        }
        Ok(recorded)
    }

    async fn process_deposits(&mut self, summary: &mut TickSummary) -> Result<(), BridgeError> {
        let deposits = self
            .relay
            .ledger()
            .pending_deposits()
            .await
            .map_err(BridgeError::transport)?;

        // forget deposits the ledger no longer lists
        let pending: HashSet<&str> = deposits.iter().map(|d| d.tx_id.as_str()).collect();
        self.handled_deposits
            .retain(|tx_id| pending.contains(tx_id.as_str()));

        for deposit in &deposits {
            if self.handled_deposits.contains(&deposit.tx_id) {
                continue;
            }

            match self.relay.mint(deposit).await {
                Ok(_) => {
                    self.handled_deposits.insert(deposit.tx_id.clone());
                    summary.minted += 1;
                }
                Err(BridgeError::AlreadyProposed { nonce, .. }) => {
                    debug!(deposit = %deposit.tx_id, nonce = %nonce, "Deposit already queued");
                    self.handled_deposits.insert(deposit.tx_id.clone());
                }
                Err(e) => {
                    summary.failed += 1;
                    if !e.is_retryable() {
                        self.handled_deposits.insert(deposit.tx_id.clone());
                    }
                    error!(
                        deposit = %deposit.tx_id,
                        retryable = e.is_retryable(),
                        error = %e,
                        "Mint failed"
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WatcherConfig::default();
        assert_eq!(config.poll_interval, Duration::from_secs(5));
        assert_eq!(config.confirmations, 1);
        assert_eq!(config.max_block_range, 10_000);
        assert!(config.start_block.is_none());
    }
}
