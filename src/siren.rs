// src/siren.rs
//
// Siren ownership. One controller, at most one sound task alive.
//
//   engage()     ─→ spawn sound_loop ─→ tick: stop previous sound, trigger again
//   disengage()  ─→ oneshot stop ─→ join (bounded) ─→ abort if still running
//
// The controller is owned by the dispatcher and mutated through `&mut self`,
// so engaged/disengaged has exactly one writer.

use crate::actuator::Actuator;
use crate::types::SirenConfig;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct SirenWorker {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Decrements the live-task count when the sound task ends or is aborted.
struct LiveGuard(Arc<AtomicUsize>);

impl LiveGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct SirenController<A: Actuator> {
    actuator: Arc<A>,
    sound_path: PathBuf,
    interval: Duration,
    join_timeout: Duration,
    worker: Option<SirenWorker>,
    live_workers: Arc<AtomicUsize>,
}

impl<A: Actuator> SirenController<A> {
    pub fn new(actuator: Arc<A>, config: &SirenConfig) -> Self {
        Self {
            actuator,
            sound_path: config.sound_path.clone(),
            interval: Duration::from_millis(config.interval_ms.max(1)),
            join_timeout: Duration::from_millis(config.join_timeout_ms),
            worker: None,
            live_workers: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.worker.is_some()
    }

    /// Sound tasks currently running (0 or 1).
    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }

    /// Start the siren. Returns false if it was already engaged.
    pub fn engage(&mut self) -> bool {
        if self.worker.is_some() {
            return false;
        }

        let (stop_tx, stop_rx) = oneshot::channel();
        let guard = LiveGuard::enter(&self.live_workers);
        let handle = tokio::spawn(sound_loop(
            Arc::clone(&self.actuator),
            self.sound_path.clone(),
            self.interval,
            stop_rx,
            guard,
        ));

        self.worker = Some(SirenWorker {
            stop: stop_tx,
            handle,
        });
        info!("✅ Siren ENGAGED");
        true
    }

    /// Stop the siren and wait for the sound task to exit. Returns false if
    /// it was not engaged. When this returns, no sound task is running.
    pub async fn disengage(&mut self) -> bool {
        let Some(SirenWorker { stop, mut handle }) = self.worker.take() else {
            return false;
        };

        // The task may already be gone; a closed channel is fine
        let _ = stop.send(());

        if tokio::time::timeout(self.join_timeout, &mut handle)
            .await
            .is_err()
        {
            warn!(
                "Siren task did not stop within {:?}, aborting it",
                self.join_timeout
            );
            handle.abort();
            let _ = handle.await;
        }

        info!("✅ Siren DISENGAGED");
        true
    }
}

async fn sound_loop<A: Actuator>(
    actuator: Arc<A>,
    sound_path: PathBuf,
    interval: Duration,
    mut stop: oneshot::Receiver<()>,
    _live: LiveGuard,
) {
    info!("🔔 Siren task started");
    let mut ticker = tokio::time::interval(interval);
    let mut playing: Option<A::Handle> = None;
    let mut fallback_reported = false;

    loop {
        tokio::select! {
            biased;
            _ = &mut stop => break,
            _ = ticker.tick() => {
                if let Some(previous) = playing.take() {
                    actuator.stop_sound(previous);
                }
                match actuator.trigger_alarm_sound(&sound_path) {
                    Ok(handle) => playing = Some(handle),
                    Err(e) => {
                        if !fallback_reported {
                            warn!("Siren sound unavailable ({}), using console output", e);
                            fallback_reported = true;
                        }
                        warn!("🔊 SIREN: ON");
                    }
                }
            }
        }
    }

    if let Some(handle) = playing.take() {
        actuator.stop_sound(handle);
    }
    info!("🔕 Siren task stopped");
}
