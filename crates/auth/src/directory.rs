//! Identity directory seam (the remote record of officer accounts).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use curia_core::{DomainError, DomainResult, IdentityId};

use crate::identity::{Identity, normalize_email};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("identity directory unavailable")]
    Unavailable,

    #[error("identity {0} not found")]
    NotFound(IdentityId),

    #[error("identity directory error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Look up an identity by (normalized) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, DirectoryError>;

    /// Check a login secret against the identity's credentials.
    async fn verify_secret(&self, identity: &Identity, secret: &str) -> Result<bool, DirectoryError>;

    /// Stamp the identity's last login.
    async fn record_login(&self, id: IdentityId, at: DateTime<Utc>) -> Result<(), DirectoryError>;
}

#[async_trait]
impl<D> IdentityDirectory for Arc<D>
where
    D: IdentityDirectory + ?Sized,
{
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, DirectoryError> {
        (**self).find_by_email(email).await
    }

    async fn verify_secret(&self, identity: &Identity, secret: &str) -> Result<bool, DirectoryError> {
        (**self).verify_secret(identity, secret).await
    }

    async fn record_login(&self, id: IdentityId, at: DateTime<Utc>) -> Result<(), DirectoryError> {
        (**self).record_login(id, at).await
    }
}

#[derive(Debug, Clone)]
struct DirectoryEntry {
    identity: Identity,
    secret: String,
}

/// In-memory directory for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryIdentityDirectory {
    entries: RwLock<HashMap<String, DirectoryEntry>>,
    unavailable: AtomicBool,
}

impl InMemoryIdentityDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an identity with its login secret.
    pub fn insert(&self, identity: Identity, secret: impl Into<String>) -> DomainResult<()> {
        identity.validate()?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DomainError::invariant("identity directory lock poisoned"))?;
        entries.insert(
            normalize_email(&identity.email),
            DirectoryEntry {
                identity,
                secret: secret.into(),
            },
        );
        Ok(())
    }

    pub fn get(&self, id: IdentityId) -> Option<Identity> {
        let entries = self.entries.read().ok()?;
        entries
            .values()
            .find(|entry| entry.identity.id == id)
            .map(|entry| entry.identity.clone())
    }

    /// Simulate the directory being unreachable.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), DirectoryError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DirectoryError::Unavailable)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, DirectoryError> {
        self.ensure_available()?;
        let entries = self
            .entries
            .read()
            .map_err(|_| DirectoryError::Backend("lock poisoned".to_string()))?;
        Ok(entries
            .get(&normalize_email(email))
            .map(|entry| entry.identity.clone()))
    }

    async fn verify_secret(&self, identity: &Identity, secret: &str) -> Result<bool, DirectoryError> {
        self.ensure_available()?;
        let entries = self
            .entries
            .read()
            .map_err(|_| DirectoryError::Backend("lock poisoned".to_string()))?;
        Ok(entries
            .get(&normalize_email(&identity.email))
            .is_some_and(|entry| entry.identity.id == identity.id && entry.secret == secret))
    }

    async fn record_login(&self, id: IdentityId, at: DateTime<Utc>) -> Result<(), DirectoryError> {
        self.ensure_available()?;
        let mut entries = self
            .entries
            .write()
            .map_err(|_| DirectoryError::Backend("lock poisoned".to_string()))?;
        let entry = entries
            .values_mut()
            .find(|entry| entry.identity.id == id)
            .ok_or(DirectoryError::NotFound(id))?;
        entry.identity.last_login_at = Some(at);
        Ok(())
    }
}
