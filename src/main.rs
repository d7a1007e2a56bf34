// src/main.rs

use anyhow::Result;
use hazard_zone_guard::actuator::HostActuator;
use hazard_zone_guard::notify::TelegramNotifier;
use hazard_zone_guard::pipeline::{ActionDispatcher, DecisionLoop, EngineMetrics};
use hazard_zone_guard::store::{MemoryStore, PostgrestStore, Store};
use hazard_zone_guard::types::{Config, Role, StoreBackend};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path =
        std::env::var("HAZARD_CONFIG").unwrap_or_else(|_| "config.yaml".to_string());
    let config = Config::load(&config_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hazard_zone_guard={},reqwest=warn",
            config.logging.level
        ))
    });
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🐍 Hazard zone guard starting");
    info!("✓ Configuration loaded from {}", config_path);
    info!(
        "Boundary x={} | siren engage>={} release<={} | STOP siren>{}",
        config.zone.line_x,
        config.dispatcher.siren_engage_risk,
        config.dispatcher.siren_release_risk,
        config.dispatcher.stop_siren_risk
    );

    match config.store.backend {
        StoreBackend::Postgrest => {
            let store = PostgrestStore::new(&config.store)?;
            info!("✓ Store: {}", config.store.url);
            run(Arc::new(store), &config).await
        }
        StoreBackend::Memory => {
            warn!("Memory store selected: only this process can see its records");
            run(Arc::new(MemoryStore::seeded()), &config).await
        }
    }
}

async fn run<S: Store>(store: Arc<S>, config: &Config) -> Result<()> {
    let metrics = EngineMetrics::new();
    let mut tasks = JoinSet::new();

    if config.runs(Role::Decision) {
        let decision = DecisionLoop::new(
            Arc::clone(&store),
            &config.zone,
            &config.decision,
            metrics.clone(),
        );
        tasks.spawn(decision.run());
        info!("✓ Decision loop started");
    }

    if config.runs(Role::Dispatcher) {
        let notifier = Arc::new(TelegramNotifier::new(&config.notifier)?);
        let actuator = Arc::new(HostActuator::new(&config.siren, &config.actuator));
        let dispatcher = ActionDispatcher::new(
            Arc::clone(&store),
            notifier,
            actuator,
            &config.dispatcher,
            &config.siren,
            metrics.clone(),
        );
        tasks.spawn(dispatcher.run());
        info!("✓ Dispatcher started");
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => info!("🛑 Shutdown requested"),
        Some(result) = tasks.join_next() => {
            if let Err(e) = result {
                error!("Loop task ended unexpectedly: {}", e);
            }
        }
    }

    tasks.shutdown().await;

    let summary = metrics.summary();
    info!(
        "📊 cycles={} ({:.1} Hz) skipped={} actions={} duplicates={} dispatched={} notifications={} interlocks={} siren on/off={}/{}",
        summary.decision_cycles,
        summary.cycle_rate_hz,
        summary.skipped_cycles,
        summary.actions_appended,
        summary.duplicates_suppressed,
        summary.actions_dispatched,
        summary.notifications,
        summary.interlocks,
        summary.siren_engagements,
        summary.siren_releases
    );
    Ok(())
}
