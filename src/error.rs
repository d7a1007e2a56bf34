// src/error.rs
//
// Typed failures at the external boundaries. None of these is fatal: the
// loops log them and skip the cycle.

use std::path::PathBuf;
use thiserror::Error;

/// Store access failures. Every variant is treated as transient.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed record: {0}")]
    Decode(#[from] serde_json::Error),

    /// A singleton the writers should have initialised is not there yet.
    #[error("Missing record: {0}")]
    MissingRecord(&'static str),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum ActuatorError {
    #[error("Sound file not found: {}", .0.display())]
    SoundMissing(PathBuf),

    #[error("No sound player configured")]
    NoPlayer,

    #[error("Actuator IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Interlock command exited with {0}")]
    InterlockFailed(String),
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Notification rejected with {status}: {body}")]
    Rejected { status: u16, body: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = StoreError::MissingRecord("telemetry");
        assert!(format!("{}", err).contains("telemetry"));

        let err = StoreError::Status {
            status: 503,
            body: "down".to_string(),
        };
        assert!(format!("{}", err).contains("503"));

        let err = ActuatorError::SoundMissing(PathBuf::from("sounds/alarm.wav"));
        assert!(format!("{}", err).contains("sounds/alarm.wav"));
    }
}
