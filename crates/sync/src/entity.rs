use chrono::{DateTime, Utc};

use curia_core::{Entity, EntityKind, RecordId};

/// A record type that can be held in a [`SyncedCollection`](crate::SyncedCollection).
///
/// `Draft` is what a caller sends to create a record; `Patch` is a partial
/// update. The server assigns ids and timestamps, which is what
/// [`SyncEntity::materialize`] models for in-process stores.
pub trait SyncEntity: Entity<Id = RecordId> + Clone + Send + Sync + 'static {
    const KIND: EntityKind;

    type Draft: Clone + Send + Sync + 'static;
    type Patch: Clone + Send + Sync + 'static;

    /// Parent the collection filter applies to, if the kind has one.
    fn parent_id(&self) -> Option<RecordId>;

    /// Parent a draft will be created under.
    fn draft_parent(_draft: &Self::Draft) -> Option<RecordId> {
        None
    }

    /// Parent a patch moves the record to, if it changes it.
    fn patch_parent(_patch: &Self::Patch) -> Option<RecordId> {
        None
    }

    /// Canonical ordering key; collections list newest first.
    fn sort_key(&self) -> DateTime<Utc>;

    /// Build the stored record from a draft.
    fn materialize(id: RecordId, draft: Self::Draft, now: DateTime<Utc>) -> Self;

    /// Apply a partial update.
    fn apply_patch(&mut self, patch: Self::Patch, now: DateTime<Utc>);

    /// Whether this record belongs to the result set of `filter`.
    fn matches(&self, filter: Option<RecordId>) -> bool {
        match filter {
            None => true,
            Some(parent) => self.parent_id() == Some(parent),
        }
    }
}

/// Server ordering: `sort_key` descending, ties broken by id descending.
pub fn canonical_order<E: SyncEntity>(a: &E, b: &E) -> core::cmp::Ordering {
    b.sort_key()
        .cmp(&a.sort_key())
        .then_with(|| b.id().as_uuid().cmp(a.id().as_uuid()))
}
