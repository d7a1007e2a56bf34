// src/store/mod.rs
//
// Shared record store between the perception source, the decision loop and
// the dispatcher. Processes never talk to each other directly; everything
// goes through one of these tables:
//
//   perception  append-only, newest row wins
//   actions     append-only ledger, id order = delivery order
//   telemetry   singleton (id = 1), overwritten in place
//   machine     singleton (id = 1), maintenance flag + operational state
//
// Consistency is eventual. Writers rely on monotonic ids and idempotent
// actuators instead of locks.

pub mod memory;
pub mod postgrest;

pub use memory::MemoryStore;
pub use postgrest::PostgrestStore;

use crate::error::StoreResult;
use crate::types::{
    ActionRecord, MachineState, NewAction, OperationalState, PerceptionSample, TelemetrySnapshot,
};
use std::future::Future;

pub trait Store: Send + Sync + 'static {
    fn latest_perception(&self)
        -> impl Future<Output = StoreResult<Option<PerceptionSample>>> + Send;

    fn append_perception(
        &self,
        point_x: i64,
        has_phone: bool,
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    fn machine_state(&self) -> impl Future<Output = StoreResult<Option<MachineState>>> + Send;

    fn set_operational_state(
        &self,
        state: OperationalState,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Append to the ledger. Returns the assigned id.
    fn append_action(&self, action: &NewAction) -> impl Future<Output = StoreResult<u64>> + Send;

    /// Ledger entries with `id > after_id`, ascending.
    fn actions_after(
        &self,
        after_id: u64,
    ) -> impl Future<Output = StoreResult<Vec<ActionRecord>>> + Send;

    fn latest_action_id(&self) -> impl Future<Output = StoreResult<Option<u64>>> + Send;

    fn telemetry(&self) -> impl Future<Output = StoreResult<Option<TelemetrySnapshot>>> + Send;

    /// Insert the telemetry singleton with a READY snapshot if it is missing.
    fn ensure_telemetry(&self) -> impl Future<Output = StoreResult<()>> + Send;

    fn update_telemetry(
        &self,
        snapshot: &TelemetrySnapshot,
    ) -> impl Future<Output = StoreResult<()>> + Send;
}
