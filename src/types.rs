use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub zone: ZoneConfig,
    pub decision: DecisionConfig,
    pub dispatcher: DispatcherConfig,
    pub siren: SirenConfig,
    pub actuator: ActuatorConfig,
    pub store: StoreConfig,
    pub notifier: NotifierConfig,
    pub roles: Vec<Role>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoneConfig {
    /// Pixel column of the safety boundary. Must match the perception source.
    pub line_x: i64,
}

impl Default for ZoneConfig {
    fn default() -> Self {
        Self { line_x: 300 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionConfig {
    pub cycle_ms: u64,
    pub telemetry_interval_ms: u64,
    pub error_backoff_ms: u64,
    pub min_dt_secs: f64,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            cycle_ms: 50, // 20Hz
            telemetry_interval_ms: 300,
            error_backoff_ms: 1000,
            min_dt_secs: 0.001,
        }
    }
}

impl DecisionConfig {
    pub fn cycle(&self) -> Duration {
        Duration::from_millis(self.cycle_ms)
    }

    pub fn telemetry_interval(&self) -> Duration {
        Duration::from_millis(self.telemetry_interval_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub action_poll_ms: u64,
    pub telemetry_poll_ms: u64,
    /// Telemetry risk at or above which the siren is engaged.
    pub siren_engage_risk: f64,
    /// Telemetry risk at or below which the siren is released.
    pub siren_release_risk: f64,
    /// A STOP order engages the siren only above this current risk.
    pub stop_siren_risk: f64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            action_poll_ms: 500,
            telemetry_poll_ms: 500,
            siren_engage_risk: 100.0,
            siren_release_risk: 80.0,
            stop_siren_risk: 90.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SirenConfig {
    pub sound_path: PathBuf,
    pub player_command: Option<String>,
    pub interval_ms: u64,
    pub join_timeout_ms: u64,
}

impl Default for SirenConfig {
    fn default() -> Self {
        Self {
            sound_path: PathBuf::from("sounds/alarm.wav"),
            player_command: None,
            interval_ms: 1000,
            join_timeout_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ActuatorConfig {
    pub cue_hold_ms: u64,
    pub interlock_hold_ms: u64,
    pub interlock_command: Option<String>,
}

impl Default for ActuatorConfig {
    fn default() -> Self {
        Self {
            cue_hold_ms: 1000,
            interlock_hold_ms: 2000,
            interlock_command: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgrest,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub url: String,
    pub api_key: String,
    pub timeout_secs: u64,
    pub tables: TableNames,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Postgrest,
            url: String::new(),
            api_key: String::new(),
            timeout_secs: 5,
            tables: TableNames::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub perception: String,
    pub actions: String,
    pub telemetry: String,
    pub machine: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            perception: "perception_samples".to_string(),
            actions: "system_actions".to_string(),
            telemetry: "brain_telemetry".to_string(),
            machine: "machine_state".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifierConfig {
    pub token: Option<String>,
    pub chat_id: String,
    pub timeout_secs: u64,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            token: None,
            chat_id: String::new(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Decision,
    Dispatcher,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ============================================================================
// STORE RECORDS
// ============================================================================

/// Latest observation published by the perception source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerceptionSample {
    pub id: u64,
    pub point_x: i64,
    pub has_phone: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActionKind {
    Stop,
    Warn,
    Log,
}

impl ActionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Stop => "STOP",
            ActionKind::Warn => "WARN",
            ActionKind::Log => "LOG",
        }
    }
}

/// Ledger entry as written by the decision loop (id assigned by the store).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAction {
    pub action: ActionKind,
    pub reason: String,
    pub risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    pub id: u64,
    pub action: ActionKind,
    pub reason: String,
    pub risk: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub risk_value: f64,
    pub state_message: String,
    pub updated_at: DateTime<Utc>,
}

impl TelemetrySnapshot {
    pub fn ready() -> Self {
        Self {
            risk_value: 0.0,
            state_message: "READY".to_string(),
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationalState {
    Running,
    Stop,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub maintenance_mode: bool,
    pub operational_state: OperationalState,
}

impl Default for MachineState {
    fn default() -> Self {
        Self {
            maintenance_mode: false,
            operational_state: OperationalState::Running,
        }
    }
}
