//! Statistics tracking for the relay.

use std::sync::atomic::{AtomicU64, Ordering};

/// Atomic counters over transaction outcomes.
pub struct Stats {
    pub relayed: AtomicU64,
    pub refused: AtomicU64,
    pub failed: AtomicU64,
    /// Cumulative response time in microseconds for averaging.
    total_response_time_us: AtomicU64,
}

impl Stats {
    pub fn new() -> Self {
        Self {
            relayed: AtomicU64::new(0),
            refused: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
        }
    }

    pub fn record_relayed(&self, response_time_ms: f64) {
        self.relayed.fetch_add(1, Ordering::Relaxed);
        self.record_time(response_time_ms);
    }

    pub fn record_refused(&self, response_time_ms: f64) {
        self.refused.fetch_add(1, Ordering::Relaxed);
        self.record_time(response_time_ms);
    }

    pub fn record_failed(&self, response_time_ms: f64) {
        self.failed.fetch_add(1, Ordering::Relaxed);
        self.record_time(response_time_ms);
    }

    fn record_time(&self, response_time_ms: f64) {
        self.total_response_time_us
            .fetch_add((response_time_ms * 1000.0) as u64, Ordering::Relaxed);
    }

    pub fn snapshot_and_reset(&self) -> StatsSnapshot {
        let relayed = self.relayed.swap(0, Ordering::Relaxed);
        let refused = self.refused.swap(0, Ordering::Relaxed);
        let failed = self.failed.swap(0, Ordering::Relaxed);
        let total_us = self.total_response_time_us.swap(0, Ordering::Relaxed);

        let transactions = relayed + refused + failed;
        let avg_response_ms = if transactions > 0 {
            (total_us as f64 / transactions as f64) / 1000.0
        } else {
            0.0
        };

        StatsSnapshot {
            transactions,
            relayed,
            refused,
            failed,
            avg_response_ms,
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StatsSnapshot {
    pub transactions: u64,
    pub relayed: u64,
    pub refused: u64,
    pub failed: u64,
    pub avg_response_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_sums_outcomes_and_resets() {
        let stats = Stats::new();
        stats.record_relayed(2.0);
        stats.record_relayed(4.0);
        stats.record_refused(1.0);
        stats.record_failed(5.0);

        let snapshot = stats.snapshot_and_reset();

        assert_eq!(snapshot.transactions, 4);
        assert_eq!(snapshot.relayed, 2);
        assert_eq!(snapshot.refused, 1);
        assert_eq!(snapshot.failed, 1);
        assert!((snapshot.avg_response_ms - 3.0).abs() < 0.001);

        let empty = stats.snapshot_and_reset();
        assert_eq!(empty.transactions, 0);
        assert_eq!(empty.avg_response_ms, 0.0);
    }
}
