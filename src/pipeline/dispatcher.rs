// src/pipeline/dispatcher.rs
//
// Turns ledger rows into physical effects and notifications.
//
// Two independent sub-loops share one owner (and therefore one siren):
//
//   action poll     ─→ rows with id > cursor ─→ STOP / WARN / LOG handlers
//   telemetry poll  ─→ current risk ─→ hysteresis ─→ engage / release
//
// Preconditions for STOP are checked against the *current* telemetry risk,
// not the risk stored on the row: risk may have dropped since the decision.

use super::metrics::EngineMetrics;
use crate::actuator::Actuator;
use crate::error::{StoreError, StoreResult};
use crate::notify::Notifier;
use crate::siren::SirenController;
use crate::store::Store;
use crate::types::{ActionKind, ActionRecord, DispatcherConfig, SirenConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Risk at which a STOP is considered certain enough to page the operator.
pub const URGENT_RISK: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SirenCommand {
    Engage,
    Release,
}

/// Asymmetric hysteresis on the telemetry risk. Between `release_at` and
/// `engage_at` nothing changes.
pub fn hysteresis_step(
    risk: f64,
    engaged: bool,
    engage_at: f64,
    release_at: f64,
) -> Option<SirenCommand> {
    if !engaged && risk >= engage_at {
        Some(SirenCommand::Engage)
    } else if engaged && risk <= release_at {
        Some(SirenCommand::Release)
    } else {
        None
    }
}

pub struct ActionDispatcher<S: Store, N: Notifier, A: Actuator> {
    store: Arc<S>,
    notifier: Arc<N>,
    actuator: Arc<A>,
    siren: SirenController<A>,
    config: DispatcherConfig,
    metrics: EngineMetrics,
    /// Last delivered ledger id. None until synced with the store.
    cursor: Option<u64>,
}

impl<S: Store, N: Notifier, A: Actuator> ActionDispatcher<S, N, A> {
    pub fn new(
        store: Arc<S>,
        notifier: Arc<N>,
        actuator: Arc<A>,
        config: &DispatcherConfig,
        siren: &SirenConfig,
        metrics: EngineMetrics,
    ) -> Self {
        Self {
            siren: SirenController::new(Arc::clone(&actuator), siren),
            store,
            notifier,
            actuator,
            config: config.clone(),
            metrics,
            cursor: None,
        }
    }

    pub fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    pub fn siren(&self) -> &SirenController<A> {
        &self.siren
    }

    /// Start from the newest existing row so a restart does not replay
    /// orders that were already handled.
    pub async fn sync_cursor(&mut self) -> StoreResult<u64> {
        let latest = self.store.latest_action_id().await?.unwrap_or(0);
        self.cursor = Some(latest);
        info!("Dispatcher cursor synced at #{}", latest);
        Ok(latest)
    }

    /// Deliver every ledger row newer than the cursor, in id order.
    /// Returns how many rows were handled.
    pub async fn poll_actions(&mut self) -> StoreResult<usize> {
        let cursor = match self.cursor {
            Some(cursor) => cursor,
            None => self.sync_cursor().await?,
        };

        let mut actions = self.store.actions_after(cursor).await?;
        actions.sort_by_key(|a| a.id);

        let mut delivered = 0;
        for action in actions {
            if self.cursor.is_some_and(|c| action.id <= c) {
                continue;
            }
            self.handle(&action).await;
            self.cursor = Some(action.id);
            self.metrics.inc(&self.metrics.actions_dispatched);
            delivered += 1;
        }
        Ok(delivered)
    }

    /// Apply hysteresis to the current telemetry risk.
    pub async fn poll_telemetry(&mut self) -> StoreResult<Option<SirenCommand>> {
        let risk = self
            .store
            .telemetry()
            .await?
            .ok_or(StoreError::MissingRecord("telemetry"))?
            .risk_value;

        let command = hysteresis_step(
            risk,
            self.siren.is_engaged(),
            self.config.siren_engage_risk,
            self.config.siren_release_risk,
        );

        match command {
            Some(SirenCommand::Engage) => {
                self.notify(&format!(
                    "🚨 Maximum risk detected: {:.1}%, engaging siren",
                    risk
                ))
                .await;
                if self.siren.engage() {
                    self.metrics.inc(&self.metrics.siren_engagements);
                }
            }
            Some(SirenCommand::Release) => {
                if self.siren.disengage().await {
                    self.metrics.inc(&self.metrics.siren_releases);
                }
                self.notify(&format!("ℹ️ Risk reduced: {:.1}%, siren off", risk))
                    .await;
            }
            None => {}
        }

        Ok(command)
    }

    pub async fn run(mut self) {
        info!("🤖 Dispatcher ready");

        if let Err(e) = self.sync_cursor().await {
            warn!("⚠️ Cursor sync failed, retrying on next poll: {}", e);
        }

        let mut action_tick =
            tokio::time::interval(Duration::from_millis(self.config.action_poll_ms.max(1)));
        let mut telemetry_tick =
            tokio::time::interval(Duration::from_millis(self.config.telemetry_poll_ms.max(1)));

        loop {
            tokio::select! {
                _ = action_tick.tick() => {
                    if let Err(e) = self.poll_actions().await {
                        warn!("⚠️ Action poll skipped: {}", e);
                        self.metrics.inc(&self.metrics.dispatch_skips);
                    }
                }
                _ = telemetry_tick.tick() => {
                    if let Err(e) = self.poll_telemetry().await {
                        warn!("⚠️ Telemetry poll skipped: {}", e);
                        self.metrics.inc(&self.metrics.dispatch_skips);
                    }
                }
            }
        }
    }

    async fn handle(&mut self, action: &ActionRecord) {
        info!("⚙️ Processing order #{}: {}", action.id, action.action.as_str());

        match action.action {
            ActionKind::Stop => self.handle_stop(action).await,
            ActionKind::Warn => self.handle_warn(action).await,
            ActionKind::Log => info!("✅ Audit recorded: {}", action.reason),
        }
    }

    async fn handle_stop(&mut self, action: &ActionRecord) {
        let current = self.current_risk().await;

        // Integer-truncated comparison: only an unmodified 100 pages
        match current {
            Some(risk) if risk.trunc() == URGENT_RISK => {
                self.notify(&format!(
                    "🚨 URGENT: Plant stop.\nReason: {}\nComputed risk: {:.1}",
                    action.reason, action.risk
                ))
                .await;
            }
            _ => info!(
                "STOP #{} not notified: current risk {:?} is not {}",
                action.id, current, URGENT_RISK
            ),
        }

        match current {
            Some(risk) if risk > self.config.stop_siren_risk => {
                if self.siren.engage() {
                    self.metrics.inc(&self.metrics.siren_engagements);
                    self.notify(&format!("🔊 Siren engaged at risk {:.1}%", risk))
                        .await;
                }
            }
            _ => info!(
                "STOP #{} leaves siren as is: current risk {:?} <= {}",
                action.id, current, self.config.stop_siren_risk
            ),
        }

        // Unconditional and last
        match self.actuator.interlock().await {
            Ok(()) => self.metrics.inc(&self.metrics.interlocks),
            Err(e) => error!("❌ Interlock failed for STOP #{}: {}", action.id, e),
        }
    }

    async fn handle_warn(&mut self, action: &ActionRecord) {
        self.actuator.warning_cue().await;
        self.notify(&format!(
            "⚠️ WARNING: {} | Risk: {:.1}%",
            action.reason, action.risk
        ))
        .await;
    }

    async fn current_risk(&self) -> Option<f64> {
        match self.store.telemetry().await {
            Ok(Some(snapshot)) => Some(snapshot.risk_value),
            Ok(None) => {
                warn!("⚠️ Telemetry row missing, treating risk as unknown");
                None
            }
            Err(e) => {
                warn!("⚠️ Failed to read current risk: {}", e);
                None
            }
        }
    }

    async fn notify(&self, text: &str) {
        self.notifier.send(text).await;
        self.metrics.inc(&self.metrics.notifications);
    }
}
