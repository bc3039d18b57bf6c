//! In-process entity store for tests/dev.
//!
//! Behaves like the remote store: assigns ids and timestamps, lists in
//! canonical order and announces every successful write on the notification
//! bus.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use curia_core::RecordId;
use curia_events::{ChangeNotice, ChangeOp, NotificationBus};

use crate::entity::{SyncEntity, canonical_order};
use crate::store::{EntityStore, StoreError};

#[derive(Debug)]
pub struct InMemoryEntityStore<E, B> {
    records: RwLock<HashMap<RecordId, E>>,
    bus: B,
    readable: AtomicBool,
    writable: AtomicBool,
    latency: Option<Duration>,
}

impl<E, B> InMemoryEntityStore<E, B>
where
    E: SyncEntity,
    B: NotificationBus,
{
    pub fn new(bus: B) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            bus,
            readable: AtomicBool::new(true),
            writable: AtomicBool::new(true),
            latency: None,
        }
    }

    /// Delay every operation, simulating a network round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Simulate losing (or regaining) connectivity for reads and writes.
    pub fn set_available(&self, available: bool) {
        self.readable.store(available, Ordering::SeqCst);
        self.writable.store(available, Ordering::SeqCst);
    }

    /// Reject writes while still serving reads.
    pub fn set_writable(&self, writable: bool) {
        self.writable.store(writable, Ordering::SeqCst);
    }

    /// Current record, bypassing availability (test inspection).
    pub fn get(&self, id: RecordId) -> Option<E> {
        self.records.read().ok()?.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|r| r.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn round_trip(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn ensure_readable(&self) -> Result<(), StoreError> {
        if self.readable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::read(E::KIND, "store unreachable"))
        }
    }

    fn ensure_writable(&self) -> Result<(), StoreError> {
        if self.writable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::write(E::KIND, "store unreachable"))
        }
    }

    fn announce(&self, op: ChangeOp) {
        if let Err(err) = self.bus.publish(ChangeNotice::new(E::KIND, op)) {
            tracing::warn!(kind = %E::KIND, ?op, error = ?err, "failed to publish change notice");
        }
    }

    fn poisoned() -> StoreError {
        StoreError::write(E::KIND, "record lock poisoned")
    }
}

#[async_trait]
impl<E, B> EntityStore<E> for InMemoryEntityStore<E, B>
where
    E: SyncEntity,
    B: NotificationBus,
{
    async fn list(&self, parent: Option<RecordId>) -> Result<Vec<E>, StoreError> {
        self.round_trip().await;
        self.ensure_readable()?;

        let records = self
            .records
            .read()
            .map_err(|_| StoreError::read(E::KIND, "record lock poisoned"))?;
        let mut items: Vec<E> = records
            .values()
            .filter(|record| record.matches(parent))
            .cloned()
            .collect();
        items.sort_by(canonical_order);
        Ok(items)
    }

    async fn insert(&self, draft: E::Draft) -> Result<E, StoreError> {
        self.round_trip().await;
        self.ensure_writable()?;

        let record = E::materialize(RecordId::new(), draft, Utc::now());
        {
            let mut records = self.records.write().map_err(|_| Self::poisoned())?;
            records.insert(*record.id(), record.clone());
        }
        self.announce(ChangeOp::Insert);
        Ok(record)
    }

    async fn update(&self, id: RecordId, patch: E::Patch) -> Result<E, StoreError> {
        self.round_trip().await;
        self.ensure_writable()?;

        let updated = {
            let mut records = self.records.write().map_err(|_| Self::poisoned())?;
            let record = records
                .get_mut(&id)
                .ok_or(StoreError::NotFound { kind: E::KIND, id })?;
            record.apply_patch(patch, Utc::now());
            record.clone()
        };
        self.announce(ChangeOp::Update);
        Ok(updated)
    }

    async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        self.round_trip().await;
        self.ensure_writable()?;

        let removed = {
            let mut records = self.records.write().map_err(|_| Self::poisoned())?;
            records.remove(&id)
        };
        if removed.is_none() {
            return Err(StoreError::NotFound { kind: E::KIND, id });
        }
        self.announce(ChangeOp::Delete);
        Ok(())
    }
}
