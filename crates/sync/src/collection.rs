//! Synchronized collection: a live local copy of one filtered remote collection.
//!
//! Lifecycle:
//!
//! ```text
//! activate() ── subscribe(kind) ── initial fetch ──► active
//!     active: notice ──► fetch()      (every notice, whoever caused it)
//!             create/update/delete ──► store first, local state on success
//! deactivate()/drop ──► listener stopped, subscription closed
//! ```
//!
//! Mutations are fail-stop: nothing touches local state until the store
//! confirms, so a failed mutation leaves the last known server state intact.
//! Concurrent operations are not serialized; the later server response wins.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use curia_core::RecordId;
use curia_events::{NotificationBus, Subscription};

use crate::entity::SyncEntity;
use crate::store::{EntityStore, StoreError};

/// Observable state of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionState<E> {
    /// Records in server order.
    pub items: Vec<E>,
    pub is_loading: bool,
    /// Message of the last failed fetch; cleared by the next successful one.
    pub error: Option<String>,
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl<E> Default for CollectionState<E> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            is_loading: false,
            error: None,
            last_synced_at: None,
        }
    }
}

struct Shared<E: SyncEntity> {
    store: Arc<dyn EntityStore<E>>,
    filter: Option<RecordId>,
    state: watch::Sender<CollectionState<E>>,
    alive: AtomicBool,
    issued_fetches: AtomicU64,
    applied_fetch: AtomicU64,
    fetches_in_flight: AtomicUsize,
}

/// Keeps `is_loading` accurate even when a fetch future is dropped mid-flight.
struct InFlight<'a, E: SyncEntity> {
    shared: &'a Shared<E>,
}

impl<'a, E: SyncEntity> InFlight<'a, E> {
    fn start(shared: &'a Shared<E>) -> Self {
        shared.fetches_in_flight.fetch_add(1, Ordering::SeqCst);
        shared.state.send_modify(|state| state.is_loading = true);
        Self { shared }
    }
}

impl<E: SyncEntity> Drop for InFlight<'_, E> {
    fn drop(&mut self) {
        let remaining = self.shared.fetches_in_flight.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            self.shared.state.send_modify(|state| state.is_loading = false);
        }
    }
}

impl<E: SyncEntity> Shared<E> {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn fetch(&self) {
        let seq = self.issued_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        let in_flight = InFlight::start(self);

        let result = self.store.list(self.filter).await;

        if !self.is_alive() {
            tracing::debug!(kind = %E::KIND, seq, "discarding fetch result for inactive collection");
            return;
        }

        // Only the newest response may land; an older one arriving late is stale.
        if self.applied_fetch.fetch_max(seq, Ordering::SeqCst) > seq {
            tracing::debug!(kind = %E::KIND, seq, "discarding stale fetch result");
            return;
        }

        match result {
            Ok(items) => {
                tracing::debug!(kind = %E::KIND, seq, count = items.len(), "collection refreshed");
                self.state.send_modify(|state| {
                    state.items = items;
                    state.error = None;
                    state.last_synced_at = Some(Utc::now());
                });
            }
            Err(err) => {
                tracing::warn!(kind = %E::KIND, seq, error = %err, "fetch failed; keeping last known items");
                self.state.send_modify(|state| state.error = Some(err.to_string()));
            }
        }

        drop(in_flight);
    }

    /// Apply a confirmed mutation to local state, unless the collection is gone.
    fn apply(&self, change: impl FnOnce(&mut CollectionState<E>)) {
        if self.is_alive() {
            self.state.send_modify(change);
        } else {
            tracing::debug!(kind = %E::KIND, "discarding mutation result for inactive collection");
        }
    }
}

/// A live local view of one entity kind, optionally filtered by parent.
///
/// Each instance owns its state; two collections over the same kind (even with
/// the same filter) fetch and subscribe independently.
pub struct SyncedCollection<E: SyncEntity> {
    shared: Arc<Shared<E>>,
    listener: Option<JoinHandle<()>>,
}

impl<E: SyncEntity> SyncedCollection<E> {
    /// Subscribe to `E`'s change notices, then perform the initial fetch.
    ///
    /// Must be called within a tokio runtime (the listener is a spawned task).
    pub async fn activate<S, B>(store: S, bus: &B, filter: Option<RecordId>) -> Self
    where
        S: EntityStore<E> + 'static,
        B: NotificationBus + ?Sized,
    {
        // Subscribe first so a change landing during the initial fetch still
        // triggers a refresh.
        let subscription = bus.subscribe(E::KIND);

        let (state, _) = watch::channel(CollectionState::default());
        let shared = Arc::new(Shared {
            store: Arc::new(store),
            filter,
            state,
            alive: AtomicBool::new(true),
            issued_fetches: AtomicU64::new(0),
            applied_fetch: AtomicU64::new(0),
            fetches_in_flight: AtomicUsize::new(0),
        });

        tracing::debug!(kind = %E::KIND, ?filter, "activating collection");
        let listener = spawn_listener(shared.clone(), subscription);
        shared.fetch().await;

        Self {
            shared,
            listener: Some(listener),
        }
    }

    pub fn filter(&self) -> Option<RecordId> {
        self.shared.filter
    }

    /// Current records, in server order.
    pub fn items(&self) -> Vec<E> {
        self.shared.state.borrow().items.clone()
    }

    /// Borrow the records without cloning them.
    pub fn with_items<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        f(&self.shared.state.borrow().items)
    }

    pub fn get(&self, id: RecordId) -> Option<E> {
        self.with_items(|items| items.iter().find(|item| *item.id() == id).cloned())
    }

    pub fn is_loading(&self) -> bool {
        self.shared.state.borrow().is_loading
    }

    pub fn error(&self) -> Option<String> {
        self.shared.state.borrow().error.clone()
    }

    pub fn snapshot(&self) -> CollectionState<E> {
        self.shared.state.borrow().clone()
    }

    /// Follow state changes.
    pub fn watch(&self) -> watch::Receiver<CollectionState<E>> {
        self.shared.state.subscribe()
    }

    /// Replace local records with the server's current result set.
    ///
    /// Failures land in [`error`](Self::error); previous records are kept.
    pub async fn refetch(&self) {
        self.shared.fetch().await;
    }

    /// Insert a record. On success it is prepended locally (if it matches the
    /// filter) and returned with its server-assigned fields.
    pub async fn create(&self, draft: E::Draft) -> Result<E, StoreError> {
        let record = self.shared.store.insert(draft).await?;

        let filter = self.shared.filter;
        let confirmed = record.clone();
        self.shared.apply(move |state| {
            if !confirmed.matches(filter) {
                return;
            }
            // A notice-driven refresh may have landed first.
            match state.items.iter_mut().find(|item| item.id() == confirmed.id()) {
                Some(existing) => *existing = confirmed,
                None => state.items.insert(0, confirmed),
            }
        });

        Ok(record)
    }

    /// Partially update a record. On success the local record is replaced by
    /// the server's version (or dropped if it left the filter).
    pub async fn update(&self, id: RecordId, patch: E::Patch) -> Result<E, StoreError> {
        let record = self.shared.store.update(id, patch).await?;

        let filter = self.shared.filter;
        let confirmed = record.clone();
        self.shared.apply(move |state| {
            if confirmed.matches(filter) {
                if let Some(existing) = state.items.iter_mut().find(|item| *item.id() == id) {
                    *existing = confirmed;
                }
            } else {
                state.items.retain(|item| *item.id() != id);
            }
        });

        Ok(record)
    }

    /// Delete a record; on success it is removed locally.
    pub async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        self.shared.store.delete(id).await?;
        self.shared
            .apply(move |state| state.items.retain(|item| *item.id() != id));
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.shared.is_alive()
    }

    /// Stop listening and close the subscription.
    ///
    /// Resolves once the listener task (and with it the subscription) is gone.
    pub async fn deactivate(mut self) {
        self.shared.alive.store(false, Ordering::SeqCst);
        if let Some(listener) = self.listener.take() {
            listener.abort();
            if let Err(err) = listener.await {
                if !err.is_cancelled() {
                    tracing::warn!(kind = %E::KIND, error = %err, "collection listener failed");
                }
            }
        }
        tracing::debug!(kind = %E::KIND, "collection deactivated");
    }
}

impl<E: SyncEntity> Drop for SyncedCollection<E> {
    fn drop(&mut self) {
        self.shared.alive.store(false, Ordering::SeqCst);
        if let Some(listener) = self.listener.take() {
            listener.abort();
        }
    }
}

impl<E: SyncEntity> core::fmt::Debug for SyncedCollection<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.shared.state.borrow();
        f.debug_struct("SyncedCollection")
            .field("kind", &E::KIND)
            .field("filter", &self.shared.filter)
            .field("items", &state.items.len())
            .field("is_loading", &state.is_loading)
            .field("error", &state.error)
            .finish()
    }
}

fn spawn_listener<E: SyncEntity>(shared: Arc<Shared<E>>, mut subscription: Subscription) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(notice) = subscription.recv().await {
            if !shared.is_alive() {
                break;
            }
            // Every notice means "refetch"; a burst needs only one.
            let coalesced = subscription.drain();
            tracing::debug!(kind = %notice.kind, op = ?notice.op, coalesced, "change notice received");
            shared.fetch().await;
        }
        tracing::debug!(kind = %E::KIND, "collection listener stopped");
    })
}
