// src/analysis/kinematics.rs

use std::time::Instant;

/// Approach velocity from consecutive relative-distance readings.
///
/// Positive velocity means the subject is closing on the boundary.
pub struct KinematicsEstimator {
    previous: Option<(f64, Instant)>, // (distance_px, observed_at)
    min_dt_secs: f64,
}

impl KinematicsEstimator {
    pub fn new(min_dt_secs: f64) -> Self {
        Self {
            previous: None,
            min_dt_secs,
        }
    }

    /// Returns px/s, or 0.0 without usable history. Always stores `distance`
    /// and `now` as the new reference point.
    pub fn update(&mut self, distance: f64, now: Instant) -> f64 {
        let velocity = match self.previous {
            Some((prev_distance, prev_time)) => {
                let dt = now.saturating_duration_since(prev_time).as_secs_f64();
                if dt > self.min_dt_secs {
                    // Shrinking distance means approaching
                    (prev_distance - distance) / dt
                } else {
                    0.0
                }
            }
            None => 0.0,
        };

        self.previous = Some((distance, now));
        velocity
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

impl Default for KinematicsEstimator {
    fn default() -> Self {
        Self::new(0.001)
    }
}
