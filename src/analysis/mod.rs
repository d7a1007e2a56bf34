// src/analysis/mod.rs
//
// Pure decision math, no I/O.
//
// Signal flow:
//   point_x ─→ line_x - point_x ─→ kinematics ─→ velocity ─┐
//                       └──────────────────────────────────┼→ fuzzy_risk ─→ classifier ─→ Decision
//   has_phone ─────────────────────────────────────────────┘

pub mod classifier;
pub mod fuzzy_risk;
pub mod kinematics;

pub use classifier::{classify, Decision};
pub use fuzzy_risk::{fuzzy_risk, MAX_RISK};
pub use kinematics::KinematicsEstimator;
