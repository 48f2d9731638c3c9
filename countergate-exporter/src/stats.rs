//! Delivery statistics of the exporter itself.

use std::sync::Arc;

use countergate_common::{Counter, MemoryCounterStore};
use parking_lot::RwLock;

/// Counter names under which the exporter reports its own activity.
pub const SCRAPES_COUNTER: &str = "exporter.metrics.exec_count";
pub const RESETS_COUNTER: &str = "exporter.metricsandreset.exec_count";
pub const PUSH_CALLS_COUNTER: &str = "pushgateway.exporter.push.call_count";
pub const PUSH_ERRORS_COUNTER: &str = "pushgateway.exporter.push.call_errors";

/// Point-in-time copy of the delivery statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Read requests served.
    pub scrapes: u64,
    /// Read-and-reset requests served.
    pub resets: u64,
    /// Pushes accepted by the gateway.
    pub pushes_sent: u64,
    /// Pushes that failed in transport or were rejected.
    pub pushes_failed: u64,
    /// Flushes that sent nothing (disabled, degraded or closed sink).
    pub pushes_skipped: u64,
}

/// Thread-safe delivery statistics.
#[derive(Debug, Default)]
pub struct DeliveryStats {
    counts: RwLock<StatsSnapshot>,
}

/// Shareable statistics handle.
pub type SharedStats = Arc<DeliveryStats>;

impl DeliveryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_scrape(&self) {
        self.counts.write().scrapes += 1;
    }

    pub fn record_reset(&self) {
        self.counts.write().resets += 1;
    }

    pub fn record_push_sent(&self) {
        self.counts.write().pushes_sent += 1;
    }

    pub fn record_push_failed(&self) {
        self.counts.write().pushes_failed += 1;
    }

    pub fn record_push_skipped(&self) {
        self.counts.write().pushes_skipped += 1;
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        self.counts.read().clone()
    }

    /// Express the statistics as increment counters.
    pub fn counters(&self) -> Vec<Counter> {
        let stats = self.snapshot();
        vec![
            Counter::increment(SCRAPES_COUNTER, stats.scrapes as i64),
            Counter::increment(RESETS_COUNTER, stats.resets as i64),
            Counter::increment(
                PUSH_CALLS_COUNTER,
                (stats.pushes_sent + stats.pushes_failed) as i64,
            ),
            Counter::increment(PUSH_ERRORS_COUNTER, stats.pushes_failed as i64),
        ]
    }

    /// Record the current statistics into a counter store.
    pub fn publish(&self, store: &MemoryCounterStore) {
        for counter in self.counters() {
            store.record(counter);
        }
    }
}
