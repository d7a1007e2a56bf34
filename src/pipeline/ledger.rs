// src/pipeline/ledger.rs
//
// Sole writer of the action ledger and the telemetry singleton.

use super::metrics::EngineMetrics;
use crate::analysis::Decision;
use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use crate::types::{ActionKind, NewAction, OperationalState, PerceptionSample, TelemetrySnapshot};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LedgerOutcome {
    /// Id of the ledger row written this cycle.
    pub appended: Option<u64>,
    pub duplicate: bool,
    pub telemetry_written: bool,
}

pub struct ActionLedger<S: Store> {
    store: Arc<S>,
    metrics: EngineMetrics,
    /// Newest perception sample that produced a ledger row.
    last_recorded_sample: u64,
    /// Risk of a STOP row whose machine-state write has not landed yet.
    pending_stop: Option<f64>,
    telemetry_interval: Duration,
    last_telemetry: Option<Instant>,
}

impl<S: Store> ActionLedger<S> {
    pub fn new(store: Arc<S>, telemetry_interval: Duration, metrics: EngineMetrics) -> Self {
        Self {
            store,
            metrics,
            last_recorded_sample: 0,
            pending_stop: None,
            telemetry_interval,
            last_telemetry: None,
        }
    }

    pub async fn ensure_telemetry(&self) -> StoreResult<()> {
        self.store.ensure_telemetry().await
    }

    /// Persist the decision for `sample` and refresh telemetry when due.
    ///
    /// At most one ledger row per sample id: a decision on a sample that is
    /// not newer than the last recorded one is dropped. STOP also forces the
    /// machine state immediately, without waiting for the dispatcher; if that
    /// write fails it is retried on every following call until it lands,
    /// even though the row itself is not appended again.
    pub async fn record(
        &mut self,
        sample: &PerceptionSample,
        decision: &Decision,
        risk: f64,
        now: Instant,
    ) -> StoreResult<LedgerOutcome> {
        let mut outcome = LedgerOutcome::default();

        if let Some(kind) = decision.action {
            if sample.id > self.last_recorded_sample {
                let id = self
                    .store
                    .append_action(&NewAction {
                        action: kind,
                        reason: decision.message.clone(),
                        risk,
                    })
                    .await?;
                self.last_recorded_sample = sample.id;
                self.metrics.inc(&self.metrics.actions_appended);
                outcome.appended = Some(id);
                debug!("Ledger #{} {} for sample {}", id, kind.as_str(), sample.id);

                if kind == ActionKind::Stop {
                    self.pending_stop = Some(risk);
                }
            } else {
                self.metrics.inc(&self.metrics.duplicates_suppressed);
                outcome.duplicate = true;
            }
        }

        if let Some(stop_risk) = self.pending_stop {
            self.store
                .set_operational_state(OperationalState::Stop)
                .await?;
            self.pending_stop = None;
            warn!("🛑 Machine state forced to STOP (risk {:.1}%)", stop_risk);
        }

        if self.telemetry_due(now) {
            self.write_telemetry(&TelemetrySnapshot {
                risk_value: risk,
                state_message: decision.message.clone(),
                updated_at: Utc::now(),
            })
            .await?;
            self.last_telemetry = Some(now);
            self.metrics.inc(&self.metrics.telemetry_writes);
            outcome.telemetry_written = true;
        }

        Ok(outcome)
    }

    /// Overwrite the singleton, recreating it first if it has gone missing.
    async fn write_telemetry(&self, snapshot: &TelemetrySnapshot) -> StoreResult<()> {
        match self.store.update_telemetry(snapshot).await {
            Err(StoreError::MissingRecord(_)) => {
                warn!("⚠️ Telemetry row missing, recreating it");
                self.store.ensure_telemetry().await?;
                self.store.update_telemetry(snapshot).await
            }
            other => other,
        }
    }

    fn telemetry_due(&self, now: Instant) -> bool {
        match self.last_telemetry {
            Some(last) => now.saturating_duration_since(last) > self.telemetry_interval,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::classify;
    use crate::store::MemoryStore;
    use crate::types::MachineState;

    fn ledger(store: &Arc<MemoryStore>) -> ActionLedger<MemoryStore> {
        ActionLedger::new(
            Arc::clone(store),
            Duration::from_millis(300),
            EngineMetrics::new(),
        )
    }

    fn sample(id: u64) -> PerceptionSample {
        PerceptionSample {
            id,
            point_x: 280,
            has_phone: false,
        }
    }

    #[tokio::test]
    async fn test_same_sample_records_once() {
        let store = Arc::new(MemoryStore::seeded());
        let mut ledger = ledger(&store);
        let decision = classify(90.0, false);
        let now = Instant::now();

        let first = ledger.record(&sample(7), &decision, 90.0, now).await.unwrap();
        let second = ledger
            .record(&sample(7), &decision, 90.0, now + Duration::from_millis(50))
            .await
            .unwrap();

        assert!(first.appended.is_some());
        assert!(second.appended.is_none());
        assert!(second.duplicate);
        assert_eq!(store.action_count(), 1);
    }

    #[tokio::test]
    async fn test_newer_sample_records_again() {
        let store = Arc::new(MemoryStore::seeded());
        let mut ledger = ledger(&store);
        let decision = classify(55.0, false);
        let now = Instant::now();

        ledger.record(&sample(3), &decision, 55.0, now).await.unwrap();
        ledger.record(&sample(4), &decision, 55.0, now).await.unwrap();

        let actions = store.actions_after(0).await.unwrap();
        assert_eq!(actions.len(), 2);
        assert!(actions.iter().all(|a| a.action == ActionKind::Warn));
    }

    #[tokio::test]
    async fn test_stop_forces_machine_state() {
        let store = Arc::new(MemoryStore::seeded());
        let mut ledger = ledger(&store);

        ledger
            .record(&sample(1), &classify(96.0, false), 96.0, Instant::now())
            .await
            .unwrap();

        let machine = store.machine_state().await.unwrap().unwrap();
        assert_eq!(machine.operational_state, OperationalState::Stop);
    }

    #[tokio::test]
    async fn test_no_action_still_updates_telemetry() {
        let store = Arc::new(MemoryStore::seeded());
        let mut ledger = ledger(&store);

        let outcome = ledger
            .record(&sample(1), &classify(10.0, true), 10.0, Instant::now())
            .await
            .unwrap();

        assert!(outcome.appended.is_none());
        assert!(!outcome.duplicate);
        assert!(outcome.telemetry_written);
        let telemetry = store.telemetry().await.unwrap().unwrap();
        assert_eq!(telemetry.risk_value, 10.0);
        assert!(telemetry.state_message.contains("DISTRACTION"));
        assert_eq!(store.action_count(), 0);
    }

    #[tokio::test]
    async fn test_telemetry_is_throttled() {
        let store = Arc::new(MemoryStore::seeded());
        let mut ledger = ledger(&store);
        let decision = classify(20.0, false);
        let t0 = Instant::now();

        let a = ledger.record(&sample(1), &decision, 20.0, t0).await.unwrap();
        let b = ledger
            .record(&sample(2), &decision, 25.0, t0 + Duration::from_millis(100))
            .await
            .unwrap();
        let c = ledger
            .record(&sample(3), &decision, 30.0, t0 + Duration::from_millis(400))
            .await
            .unwrap();

        assert!(a.telemetry_written);
        assert!(!b.telemetry_written);
        assert!(c.telemetry_written);
        assert_eq!(store.telemetry().await.unwrap().unwrap().risk_value, 30.0);
    }

    #[tokio::test]
    async fn test_failed_append_does_not_advance_dedup() {
        let store = Arc::new(MemoryStore::seeded());
        let mut ledger = ledger(&store);
        let decision = classify(90.0, false);

        store.set_offline(true);
        assert!(ledger
            .record(&sample(5), &decision, 90.0, Instant::now())
            .await
            .is_err());

        store.set_offline(false);
        let retry = ledger
            .record(&sample(5), &decision, 90.0, Instant::now())
            .await
            .unwrap();
        assert!(retry.appended.is_some());
    }

    #[tokio::test]
    async fn test_failed_stop_state_write_is_retried() {
        // Telemetry present, machine row not there yet
        let store = Arc::new(MemoryStore::new());
        store.ensure_telemetry().await.unwrap();
        let mut ledger = ledger(&store);
        let decision = classify(95.0, false);
        let t0 = Instant::now();

        assert!(ledger.record(&sample(1), &decision, 95.0, t0).await.is_err());
        assert_eq!(store.action_count(), 1);

        store.set_machine_state(MachineState::default());
        let retry = ledger
            .record(&sample(1), &decision, 95.0, t0 + Duration::from_millis(50))
            .await
            .unwrap();

        assert!(retry.duplicate);
        assert_eq!(store.action_count(), 1);
        let machine = store.machine_state().await.unwrap().unwrap();
        assert_eq!(machine.operational_state, OperationalState::Stop);
    }

    #[tokio::test]
    async fn test_missing_telemetry_row_is_recreated() {
        let store = Arc::new(MemoryStore::new());
        store.set_machine_state(MachineState::default());
        let mut ledger = ledger(&store);

        let outcome = ledger
            .record(&sample(1), &classify(20.0, false), 20.0, Instant::now())
            .await
            .unwrap();

        assert!(outcome.telemetry_written);
        let telemetry = store.telemetry().await.unwrap().unwrap();
        assert_eq!(telemetry.risk_value, 20.0);
        assert_eq!(telemetry.state_message, "NOMINAL OPERATION");
    }
}
