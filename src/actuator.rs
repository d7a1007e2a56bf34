// src/actuator.rs
//
// Physical side effects: alarm sound, short warning cue, power interlock.
//
// The host implementation shells out to a configured player / interlock
// command. Without one it falls back to console output so that the
// dispatcher keeps working on machines with no sound device.

use crate::error::ActuatorError;
use crate::types::{ActuatorConfig, SirenConfig};
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::{Child, Command};
use tracing::{error, info, warn};

pub trait Actuator: Send + Sync + 'static {
    /// Opaque handle to a sound that is currently playing.
    type Handle: Send + 'static;

    fn trigger_alarm_sound(&self, path: &Path) -> Result<Self::Handle, ActuatorError>;

    fn stop_sound(&self, handle: Self::Handle);

    /// Short audible/visual caution for WARN orders. Returns once the cue
    /// has started; holding it must not stall the caller.
    fn warning_cue(&self) -> impl Future<Output = ()> + Send;

    /// Cut machine power. The cut itself must complete before a STOP is
    /// considered handled; any hold afterwards runs on its own.
    fn interlock(&self) -> impl Future<Output = Result<(), ActuatorError>> + Send;
}

pub struct HostActuator {
    player_command: Option<String>,
    interlock_command: Option<String>,
    cue_hold: Duration,
    interlock_hold: Duration,
}

impl HostActuator {
    pub fn new(siren: &SirenConfig, actuator: &ActuatorConfig) -> Self {
        Self {
            player_command: siren.player_command.clone(),
            interlock_command: actuator.interlock_command.clone(),
            cue_hold: Duration::from_millis(actuator.cue_hold_ms),
            interlock_hold: Duration::from_millis(actuator.interlock_hold_ms),
        }
    }
}

impl Actuator for HostActuator {
    type Handle = Child;

    fn trigger_alarm_sound(&self, path: &Path) -> Result<Child, ActuatorError> {
        if !path.exists() {
            return Err(ActuatorError::SoundMissing(path.to_path_buf()));
        }
        let player = self.player_command.as_deref().ok_or(ActuatorError::NoPlayer)?;

        let child = Command::new(player)
            .arg(path)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        Ok(child)
    }

    fn stop_sound(&self, mut handle: Child) {
        // Already exited is fine
        let _ = handle.start_kill();
    }

    async fn warning_cue(&self) {
        warn!("⚠️  AUDIBLE ALERT: CAUTION  ⚠️");
        hold_in_background(self.cue_hold, "Caution cue cleared");
    }

    async fn interlock(&self) -> Result<(), ActuatorError> {
        error!("🛑🛑 INTERLOCK ENGAGED: POWER CUT 🛑🛑");

        if let Some(command) = self.interlock_command.as_deref() {
            let status = Command::new(command).status().await?;
            if !status.success() {
                return Err(ActuatorError::InterlockFailed(status.to_string()));
            }
            info!("Interlock command '{}' completed", command);
        }

        hold_in_background(self.interlock_hold, "Interlock hold elapsed");
        Ok(())
    }
}

fn hold_in_background(hold: Duration, done: &'static str) {
    tokio::spawn(async move {
        tokio::time::sleep(hold).await;
        info!("{}", done);
    });
}
