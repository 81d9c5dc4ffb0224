//! Prometheus metrics for the relay
//!
//! Registered in the default registry; `render` produces the text exposition
//! format for whatever scrapes or logs it.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};

lazy_static! {
    // Scan metrics
    pub static ref BLOCKS_SCANNED: Counter = register_counter!(
        "safe_bridge_blocks_scanned_total",
        "Total number of confirmed blocks scanned for burns"
    ).unwrap();

    pub static ref SCAN_CURSOR: Gauge = register_gauge!(
        "safe_bridge_scan_cursor",
        "Next block the relay will scan"
    ).unwrap();

    pub static ref LOGS_SKIPPED: Counter = register_counter!(
        "safe_bridge_logs_skipped_total",
        "Total number of bridge logs skipped because they did not decode"
    ).unwrap();

    // Release metrics
    pub static ref RELEASES: CounterVec = register_counter_vec!(
        "safe_bridge_releases_total",
        "Total number of native-ledger releases by outcome",
        &["status"]
    ).unwrap();

    // Mint proposal metrics
    pub static ref PROPOSALS: CounterVec = register_counter_vec!(
        "safe_bridge_proposals_total",
        "Total number of Safe mint proposals by outcome",
        &["status"]
    ).unwrap();
}

/// Record a scanned block range and the cursor that follows it
pub fn record_blocks_scanned(count: u64, cursor: u64) {
    BLOCKS_SCANNED.inc_by(count as f64);
    SCAN_CURSOR.set(cursor as f64);
}

pub fn record_logs_skipped(count: usize) {
    LOGS_SKIPPED.inc_by(count as f64);
}

/// `status` is one of `released`, `failed`, `unrecorded` or `recorded`
pub fn record_release(status: &str) {
    RELEASES.with_label_values(&[status]).inc();
}

/// `status` is one of `submitted`, `rejected` or `duplicate`
pub fn record_proposal(status: &str) {
    PROPOSALS.with_label_values(&[status]).inc();
}

/// Current metrics in the Prometheus text format
pub fn render() -> String {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&prometheus::gather(), &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let before = BLOCKS_SCANNED.get();
        record_blocks_scanned(11, 121);
        assert!(BLOCKS_SCANNED.get() >= before + 11.0);

        let before = PROPOSALS.with_label_values(&["rejected"]).get();
        record_proposal("rejected");
        assert!(PROPOSALS.with_label_values(&["rejected"]).get() >= before + 1.0);
    }

    #[test]
    fn test_render_lists_relay_metrics() {
        record_release("released");
        record_logs_skipped(0);
        let text = render();
        assert!(text.contains("safe_bridge_releases_total"), "{}", text);
        assert!(text.contains("safe_bridge_logs_skipped_total"), "{}", text);
    }
}
