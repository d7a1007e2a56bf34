// src/pipeline/decision.rs
//
// The ~20Hz decision loop: newest perception sample → velocity → fuzzy
// risk → classification → ledger/telemetry.

use super::ledger::{ActionLedger, LedgerOutcome};
use super::metrics::EngineMetrics;
use crate::analysis::{classify, fuzzy_risk, Decision, KinematicsEstimator};
use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use crate::types::{DecisionConfig, ZoneConfig};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub sample_id: u64,
    pub distance: f64,
    pub velocity: f64,
    pub risk: f64,
    pub maintenance_mode: bool,
    pub decision: Decision,
    pub ledger: LedgerOutcome,
}

pub struct DecisionLoop<S: Store> {
    store: Arc<S>,
    line_x: i64,
    config: DecisionConfig,
    kinematics: KinematicsEstimator,
    ledger: ActionLedger<S>,
    metrics: EngineMetrics,
}

impl<S: Store> DecisionLoop<S> {
    pub fn new(
        store: Arc<S>,
        zone: &ZoneConfig,
        config: &DecisionConfig,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            ledger: ActionLedger::new(
                Arc::clone(&store),
                config.telemetry_interval(),
                metrics.clone(),
            ),
            store,
            line_x: zone.line_x,
            config: config.clone(),
            kinematics: KinematicsEstimator::new(config.min_dt_secs),
            metrics,
        }
    }

    /// One decision cycle. Both the newest sample and the machine-state
    /// singleton must exist; otherwise the cycle is skipped.
    pub async fn cycle(&mut self, now: Instant) -> StoreResult<CycleReport> {
        let sample = self
            .store
            .latest_perception()
            .await?
            .ok_or(StoreError::MissingRecord("perception sample"))?;
        let machine = self
            .store
            .machine_state()
            .await?
            .ok_or(StoreError::MissingRecord("machine state"))?;

        let distance = (self.line_x - sample.point_x) as f64;
        // Timed between cycles, not between samples: a source slower than the
        // cycle rate reads as 0 while unchanged, then as one large burst.
        let velocity = self.kinematics.update(distance, now);
        let risk = fuzzy_risk(sample.point_x, self.line_x, velocity, sample.has_phone);
        let decision = classify(risk, sample.has_phone);

        let ledger = self.ledger.record(&sample, &decision, risk, now).await?;
        self.metrics.inc(&self.metrics.decision_cycles);

        Ok(CycleReport {
            sample_id: sample.id,
            distance,
            velocity,
            risk,
            maintenance_mode: machine.maintenance_mode,
            decision,
            ledger,
        })
    }

    pub async fn run(mut self) {
        info!(
            "🧠 Decision loop online | boundary x={} | {}ms cycle",
            self.line_x, self.config.cycle_ms
        );

        if let Err(e) = self.ledger.ensure_telemetry().await {
            warn!("⚠️ Telemetry init failed, recreated on first write: {}", e);
        }

        loop {
            match self.cycle(Instant::now()).await {
                Ok(report) => {
                    // Console line follows the telemetry cadence
                    if report.ledger.telemetry_written {
                        log_report(&report);
                    }
                }
                Err(e) => tokio::time::sleep(self.skip_cycle(&e)).await,
            }

            tokio::time::sleep(self.config.cycle()).await;
        }
    }

    /// Account for a failed cycle and return how long to back off before the
    /// next one. No error ends the loop.
    pub fn skip_cycle(&self, err: &StoreError) -> Duration {
        match err {
            StoreError::MissingRecord(what) => debug!("Waiting for {}", what),
            e => warn!("❌ Decision cycle skipped: {}", e),
        }
        self.metrics.inc(&self.metrics.skipped_cycles);
        self.config.error_backoff()
    }
}

fn risk_band(risk: f64) -> &'static str {
    if risk > 70.0 {
        "🔴"
    } else if risk > 30.0 {
        "🟡"
    } else {
        "🟢"
    }
}

fn log_report(report: &CycleReport) {
    info!(
        "{} [FUZZY] Risk: {:05.2}% | Dist: {}px | Vel: {:+.1}px/s{}",
        risk_band(report.risk),
        report.risk,
        report.distance as i64,
        report.velocity,
        if report.maintenance_mode { " | MAINT" } else { "" }
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::types::{ActionKind, MachineState, OperationalState};

    fn decision_loop(store: &Arc<MemoryStore>) -> DecisionLoop<MemoryStore> {
        DecisionLoop::new(
            Arc::clone(store),
            &ZoneConfig::default(),
            &DecisionConfig::default(),
            EngineMetrics::new(),
        )
    }

    #[tokio::test]
    async fn test_repeated_sample_yields_one_action() {
        let store = Arc::new(MemoryStore::seeded());
        // Critical distance, standing still: ~95 → STOP on every cycle
        store.append_perception(295, false).await.unwrap();

        let mut brain = decision_loop(&store);
        let t0 = Instant::now();
        let first = brain.cycle(t0).await.unwrap();
        let second = brain.cycle(t0 + Duration::from_millis(50)).await.unwrap();

        assert_eq!(first.decision.action, Some(ActionKind::Stop));
        assert_eq!(second.decision.action, Some(ActionKind::Stop));
        assert!(second.ledger.duplicate);
        assert_eq!(store.action_count(), 1);

        let machine = store.machine_state().await.unwrap().unwrap();
        assert_eq!(machine.operational_state, OperationalState::Stop);
    }

    #[tokio::test]
    async fn test_velocity_from_consecutive_samples() {
        let store = Arc::new(MemoryStore::seeded());
        let mut brain = decision_loop(&store);
        let t0 = Instant::now();

        store.append_perception(100, false).await.unwrap();
        let first = brain.cycle(t0).await.unwrap();
        assert_eq!(first.velocity, 0.0);
        assert_eq!(first.distance, 200.0);

        store.append_perception(140, false).await.unwrap();
        let second = brain.cycle(t0 + Duration::from_millis(500)).await.unwrap();
        assert!((second.velocity - 80.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_machine_state_skips_cycle() {
        let store = Arc::new(MemoryStore::new());
        store.append_perception(295, false).await.unwrap();

        let mut brain = decision_loop(&store);
        let result = brain.cycle(Instant::now()).await;

        assert!(matches!(result, Err(StoreError::MissingRecord(_))));
        assert_eq!(store.action_count(), 0);
    }

    #[tokio::test]
    async fn test_no_sample_skips_cycle() {
        let store = Arc::new(MemoryStore::seeded());
        let mut brain = decision_loop(&store);
        assert!(matches!(
            brain.cycle(Instant::now()).await,
            Err(StoreError::MissingRecord("perception sample"))
        ));
    }

    #[tokio::test]
    async fn test_safe_subject_writes_nominal_telemetry() {
        let store = Arc::new(MemoryStore::seeded());
        store.append_perception(0, false).await.unwrap();

        let mut brain = decision_loop(&store);
        let report = brain.cycle(Instant::now()).await.unwrap();

        assert_eq!(report.decision.action, None);
        let telemetry = store.telemetry().await.unwrap().unwrap();
        assert_eq!(telemetry.state_message, "NOMINAL OPERATION");
        assert_eq!(store.action_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_source_reads_as_burst() {
        let store = Arc::new(MemoryStore::seeded());
        let mut brain = decision_loop(&store);
        let t0 = Instant::now();

        store.append_perception(100, false).await.unwrap();
        brain.cycle(t0).await.unwrap();
        // Same sample on the next cycle: no movement seen
        let idle = brain.cycle(t0 + Duration::from_millis(50)).await.unwrap();
        assert_eq!(idle.velocity, 0.0);

        // 40px step lands within one 50ms cycle
        store.append_perception(140, false).await.unwrap();
        let step = brain.cycle(t0 + Duration::from_millis(100)).await.unwrap();
        assert!((step.velocity - 800.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_skip_cycle_counts_and_backs_off() {
        let store = Arc::new(MemoryStore::seeded());
        let brain = decision_loop(&store);

        let waiting = brain.skip_cycle(&StoreError::MissingRecord("perception sample"));
        let failed = brain.skip_cycle(&StoreError::Status {
            status: 503,
            body: "offline".to_string(),
        });

        assert_eq!(waiting, DecisionConfig::default().error_backoff());
        assert_eq!(failed, waiting);
        assert_eq!(brain.metrics.get(&brain.metrics.skipped_cycles), 2);
        assert_eq!(brain.metrics.get(&brain.metrics.decision_cycles), 0);
    }

    #[tokio::test]
    async fn test_recovers_after_failed_telemetry_init() {
        let store = Arc::new(MemoryStore::new());
        store.set_machine_state(MachineState::default());
        let mut brain = decision_loop(&store);

        store.set_offline(true);
        assert!(brain.ledger.ensure_telemetry().await.is_err());
        store.set_offline(false);

        store.append_perception(0, false).await.unwrap();
        let report = brain.cycle(Instant::now()).await.unwrap();

        assert!(report.ledger.telemetry_written);
        assert!(store.telemetry().await.unwrap().is_some());
    }

    #[test]
    fn test_risk_band() {
        assert_eq!(risk_band(80.0), "🔴");
        assert_eq!(risk_band(50.0), "🟡");
        assert_eq!(risk_band(10.0), "🟢");
    }
}
