//! Remote entity store seam.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use curia_core::{EntityKind, RecordId};

use crate::entity::SyncEntity;

/// Store-level failure, surfaced to callers as-is.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("failed to load {kind} records: {message}")]
    Read { kind: EntityKind, message: String },

    #[error("failed to save {kind} record: {message}")]
    Write { kind: EntityKind, message: String },

    #[error("{kind} {id} does not exist")]
    NotFound { kind: EntityKind, id: RecordId },
}

impl StoreError {
    pub fn read(kind: EntityKind, message: impl Into<String>) -> Self {
        Self::Read {
            kind,
            message: message.into(),
        }
    }

    pub fn write(kind: EntityKind, message: impl Into<String>) -> Self {
        Self::Write {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            StoreError::Read { kind, .. }
            | StoreError::Write { kind, .. }
            | StoreError::NotFound { kind, .. } => *kind,
        }
    }
}

/// Per-kind remote collection.
///
/// `list` returns the filtered result set already in canonical order
/// (newest first); callers never re-sort it.
#[async_trait]
pub trait EntityStore<E: SyncEntity>: Send + Sync {
    async fn list(&self, parent: Option<RecordId>) -> Result<Vec<E>, StoreError>;

    async fn insert(&self, draft: E::Draft) -> Result<E, StoreError>;

    async fn update(&self, id: RecordId, patch: E::Patch) -> Result<E, StoreError>;

    async fn delete(&self, id: RecordId) -> Result<(), StoreError>;
}

#[async_trait]
impl<E, S> EntityStore<E> for Arc<S>
where
    E: SyncEntity,
    S: EntityStore<E> + ?Sized,
{
    async fn list(&self, parent: Option<RecordId>) -> Result<Vec<E>, StoreError> {
        (**self).list(parent).await
    }

    async fn insert(&self, draft: E::Draft) -> Result<E, StoreError> {
        (**self).insert(draft).await
    }

    async fn update(&self, id: RecordId, patch: E::Patch) -> Result<E, StoreError> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: RecordId) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}
