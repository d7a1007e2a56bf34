// src/store/memory.rs
//
// In-process store. Backs the test suite and `backend: memory` dry runs.

use super::Store;
use crate::error::{StoreError, StoreResult};
use crate::types::{
    ActionRecord, MachineState, NewAction, OperationalState, PerceptionSample, TelemetrySnapshot,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Tables {
    perception: Vec<PerceptionSample>,
    actions: Vec<ActionRecord>,
    telemetry: Option<TelemetrySnapshot>,
    machine: Option<MachineState>,
    next_perception_id: u64,
    next_action_id: u64,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with both singletons present, as after a completed setup.
    pub fn seeded() -> Self {
        let store = Self::new();
        {
            let mut tables = store.write();
            tables.machine = Some(MachineState::default());
            tables.telemetry = Some(TelemetrySnapshot::ready());
        }
        store
    }

    pub fn set_machine_state(&self, state: MachineState) {
        self.write().machine = Some(state);
    }

    /// Overwrite the telemetry risk directly, bypassing the decision loop.
    pub fn set_risk(&self, risk_value: f64) {
        let mut tables = self.write();
        let mut snapshot = tables.telemetry.take().unwrap_or_else(TelemetrySnapshot::ready);
        snapshot.risk_value = risk_value;
        snapshot.updated_at = chrono::Utc::now();
        tables.telemetry = Some(snapshot);
    }

    /// While offline every call fails with a 503, like an unreachable backend.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn action_count(&self) -> usize {
        self.read().actions.len()
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Status {
                status: 503,
                body: "memory store offline".to_string(),
            })
        } else {
            Ok(())
        }
    }

    // A panic while holding the lock cannot leave the tables half-written,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl Store for MemoryStore {
    async fn latest_perception(&self) -> StoreResult<Option<PerceptionSample>> {
        self.check_online()?;
        Ok(self.read().perception.last().copied())
    }

    async fn append_perception(&self, point_x: i64, has_phone: bool) -> StoreResult<u64> {
        self.check_online()?;
        let mut tables = self.write();
        tables.next_perception_id += 1;
        let id = tables.next_perception_id;
        tables.perception.push(PerceptionSample {
            id,
            point_x,
            has_phone,
        });
        Ok(id)
    }

    async fn machine_state(&self) -> StoreResult<Option<MachineState>> {
        self.check_online()?;
        Ok(self.read().machine)
    }

    async fn set_operational_state(&self, state: OperationalState) -> StoreResult<()> {
        self.check_online()?;
        let mut tables = self.write();
        let machine = tables
            .machine
            .as_mut()
            .ok_or(StoreError::MissingRecord("machine state"))?;
        machine.operational_state = state;
        Ok(())
    }

    async fn append_action(&self, action: &NewAction) -> StoreResult<u64> {
        self.check_online()?;
        let mut tables = self.write();
        tables.next_action_id += 1;
        let id = tables.next_action_id;
        tables.actions.push(ActionRecord {
            id,
            action: action.action,
            reason: action.reason.clone(),
            risk: action.risk,
        });
        Ok(id)
    }

    async fn actions_after(&self, after_id: u64) -> StoreResult<Vec<ActionRecord>> {
        self.check_online()?;
        // Ids are assigned in push order, so the vec is already ascending
        Ok(self
            .read()
            .actions
            .iter()
            .filter(|a| a.id > after_id)
            .cloned()
            .collect())
    }

    async fn latest_action_id(&self) -> StoreResult<Option<u64>> {
        self.check_online()?;
        Ok(self.read().actions.last().map(|a| a.id))
    }

    async fn telemetry(&self) -> StoreResult<Option<TelemetrySnapshot>> {
        self.check_online()?;
        Ok(self.read().telemetry.clone())
    }

    async fn ensure_telemetry(&self) -> StoreResult<()> {
        self.check_online()?;
        let mut tables = self.write();
        if tables.telemetry.is_none() {
            tables.telemetry = Some(TelemetrySnapshot::ready());
        }
        Ok(())
    }

    async fn update_telemetry(&self, snapshot: &TelemetrySnapshot) -> StoreResult<()> {
        self.check_online()?;
        let mut tables = self.write();
        if tables.telemetry.is_none() {
            return Err(StoreError::MissingRecord("telemetry"));
        }
        tables.telemetry = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActionKind;

    fn stop(risk: f64) -> NewAction {
        NewAction {
            action: ActionKind::Stop,
            reason: "test".to_string(),
            risk,
        }
    }

    #[tokio::test]
    async fn test_action_ids_are_monotonic() {
        let store = MemoryStore::new();
        let a = store.append_action(&stop(90.0)).await.unwrap();
        let b = store.append_action(&stop(91.0)).await.unwrap();
        assert!(b > a);

        let after = store.actions_after(a).await.unwrap();
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].id, b);
        assert_eq!(store.latest_action_id().await.unwrap(), Some(b));
    }

    #[tokio::test]
    async fn test_latest_perception_wins() {
        let store = MemoryStore::new();
        assert!(store.latest_perception().await.unwrap().is_none());

        store.append_perception(100, false).await.unwrap();
        let id = store.append_perception(250, true).await.unwrap();

        let latest = store.latest_perception().await.unwrap().unwrap();
        assert_eq!(latest.id, id);
        assert_eq!(latest.point_x, 250);
        assert!(latest.has_phone);
    }

    #[tokio::test]
    async fn test_singletons_must_exist_before_update() {
        let store = MemoryStore::new();
        assert!(matches!(
            store.update_telemetry(&TelemetrySnapshot::ready()).await,
            Err(StoreError::MissingRecord(_))
        ));
        assert!(matches!(
            store.set_operational_state(OperationalState::Stop).await,
            Err(StoreError::MissingRecord(_))
        ));

        store.ensure_telemetry().await.unwrap();
        store.update_telemetry(&TelemetrySnapshot::ready()).await.unwrap();
    }

    #[tokio::test]
    async fn test_ensure_telemetry_keeps_existing_row() {
        let store = MemoryStore::seeded();
        store.set_risk(72.0);
        store.ensure_telemetry().await.unwrap();
        assert_eq!(store.telemetry().await.unwrap().unwrap().risk_value, 72.0);
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let store = MemoryStore::seeded();
        store.set_offline(true);
        assert!(store.telemetry().await.is_err());
        assert!(store.append_action(&stop(90.0)).await.is_err());

        store.set_offline(false);
        assert!(store.telemetry().await.is_ok());
    }
}
