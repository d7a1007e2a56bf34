// src/pipeline/metrics.rs
//
// Counters shared by the decision loop and the dispatcher. Logged as a
// summary on shutdown.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone)]
pub struct EngineMetrics {
    pub decision_cycles: Arc<AtomicU64>,
    pub skipped_cycles: Arc<AtomicU64>,
    pub actions_appended: Arc<AtomicU64>,
    pub duplicates_suppressed: Arc<AtomicU64>,
    pub telemetry_writes: Arc<AtomicU64>,
    pub actions_dispatched: Arc<AtomicU64>,
    pub dispatch_skips: Arc<AtomicU64>,
    pub notifications: Arc<AtomicU64>,
    pub interlocks: Arc<AtomicU64>,
    pub siren_engagements: Arc<AtomicU64>,
    pub siren_releases: Arc<AtomicU64>,
    pub started_at: Instant,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self {
            decision_cycles: Arc::new(AtomicU64::new(0)),
            skipped_cycles: Arc::new(AtomicU64::new(0)),
            actions_appended: Arc::new(AtomicU64::new(0)),
            duplicates_suppressed: Arc::new(AtomicU64::new(0)),
            telemetry_writes: Arc::new(AtomicU64::new(0)),
            actions_dispatched: Arc::new(AtomicU64::new(0)),
            dispatch_skips: Arc::new(AtomicU64::new(0)),
            notifications: Arc::new(AtomicU64::new(0)),
            interlocks: Arc::new(AtomicU64::new(0)),
            siren_engagements: Arc::new(AtomicU64::new(0)),
            siren_releases: Arc::new(AtomicU64::new(0)),
            started_at: Instant::now(),
        }
    }

    pub fn inc(&self, counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self, counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Decision cycles per second since start.
    pub fn cycle_rate(&self) -> f64 {
        let cycles = self.decision_cycles.load(Ordering::Relaxed);
        let elapsed = self.started_at.elapsed().as_secs_f64();
        if elapsed > 0.01 {
            cycles as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            decision_cycles: self.decision_cycles.load(Ordering::Relaxed),
            cycle_rate_hz: self.cycle_rate(),
            skipped_cycles: self.skipped_cycles.load(Ordering::Relaxed),
            actions_appended: self.actions_appended.load(Ordering::Relaxed),
            duplicates_suppressed: self.duplicates_suppressed.load(Ordering::Relaxed),
            telemetry_writes: self.telemetry_writes.load(Ordering::Relaxed),
            actions_dispatched: self.actions_dispatched.load(Ordering::Relaxed),
            dispatch_skips: self.dispatch_skips.load(Ordering::Relaxed),
            notifications: self.notifications.load(Ordering::Relaxed),
            interlocks: self.interlocks.load(Ordering::Relaxed),
            siren_engagements: self.siren_engagements.load(Ordering::Relaxed),
            siren_releases: self.siren_releases.load(Ordering::Relaxed),
            elapsed_secs: self.started_at.elapsed().as_secs_f64(),
        }
    }
}

impl Default for EngineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct MetricsSummary {
    pub decision_cycles: u64,
    pub cycle_rate_hz: f64,
    pub skipped_cycles: u64,
    pub actions_appended: u64,
    pub duplicates_suppressed: u64,
    pub telemetry_writes: u64,
    pub actions_dispatched: u64,
    pub dispatch_skips: u64,
    pub notifications: u64,
    pub interlocks: u64,
    pub siren_engagements: u64,
    pub siren_releases: u64,
    pub elapsed_secs: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_counters() {
        let metrics = EngineMetrics::new();
        let clone = metrics.clone();

        clone.inc(&clone.actions_appended);
        clone.inc(&clone.actions_appended);
        metrics.inc(&metrics.skipped_cycles);

        let summary = metrics.summary();
        assert_eq!(summary.actions_appended, 2);
        assert_eq!(summary.skipped_cycles, 1);
        assert_eq!(summary.decision_cycles, 0);
    }
}
