// src/pipeline/mod.rs
//
// The two long-running loops and what they share. They never call each
// other: the decision loop writes the store, the dispatcher reads it.

pub mod decision;
pub mod dispatcher;
pub mod ledger;
pub mod metrics;

pub use decision::{CycleReport, DecisionLoop};
pub use dispatcher::{hysteresis_step, ActionDispatcher, SirenCommand};
pub use ledger::{ActionLedger, LedgerOutcome};
pub use metrics::EngineMetrics;
