//! Session store: owns the current identity and its lifecycle.
//!
//! The store is an explicit object handed to whoever needs it; there is no
//! ambient "current user". Observers follow state changes through a
//! [`tokio::sync::watch`] channel.
//!
//! ```text
//!            restore()                  login() ok
//! Loading ──────────────► Unauthenticated ─────► Authenticated
//!                              ▲     login() err  │
//!                              └──────────────────┘ logout()
//! ```

use chrono::Utc;
use thiserror::Error;
use tokio::sync::watch;

use curia_core::{DomainError, UnitId};

use crate::authorize;
use crate::directory::{DirectoryError, IdentityDirectory};
use crate::identity::{AccountStatus, Identity, normalize_email};
use crate::permissions::Permission;
use crate::storage::{KeyValueStorage, StorageError};

/// Storage key holding the serialized current identity.
pub const SESSION_STORAGE_KEY: &str = "curia.session.identity";

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionPhase {
    Loading,
    Unauthenticated,
    Authenticated,
}

/// Transient projection of "the current identity plus loading state".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
    loading: bool,
}

impl Session {
    /// Initial state, before `restore()` has completed.
    pub fn loading() -> Self {
        Self {
            identity: None,
            loading: true,
        }
    }

    pub fn anonymous() -> Self {
        Self {
            identity: None,
            loading: false,
        }
    }

    pub fn authenticated(identity: Identity) -> Self {
        Self {
            identity: Some(identity),
            loading: false,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn phase(&self) -> SessionPhase {
        match (self.loading, &self.identity) {
            (true, _) => SessionPhase::Loading,
            (false, None) => SessionPhase::Unauthenticated,
            (false, Some(_)) => SessionPhase::Authenticated,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Errors
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account is {0}; only active accounts can sign in")]
    AccountNotActive(AccountStatus),

    #[error("account record is invalid: {0}")]
    InvalidIdentity(#[from] DomainError),

    #[error("could not reach the identity directory: {0}")]
    Directory(#[from] DirectoryError),

    #[error("could not save the session: {0}")]
    Storage(#[from] StorageError),
}

// ─────────────────────────────────────────────────────────────────────────────
// Store
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of the session lifecycle (restore, login, logout).
///
/// The durable entry under [`SESSION_STORAGE_KEY`] is written only here.
pub struct SessionStore<D, S> {
    directory: D,
    storage: S,
    state: watch::Sender<Session>,
}

/// Restores the pre-operation session if an operation exits without settling,
/// including when its future is dropped mid-flight.
struct LoadingGuard<'a> {
    state: &'a watch::Sender<Session>,
    previous: Option<Identity>,
    settled: bool,
}

impl<'a> LoadingGuard<'a> {
    fn begin(state: &'a watch::Sender<Session>) -> Self {
        let mut previous = None;
        state.send_modify(|session| {
            previous = session.identity.clone();
            session.loading = true;
        });
        Self {
            state,
            previous,
            settled: false,
        }
    }

    fn settle(mut self, identity: Option<Identity>) -> Session {
        self.settled = true;
        let session = Session {
            identity,
            loading: false,
        };
        self.state.send_replace(session.clone());
        session
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.state.send_replace(Session {
                identity: self.previous.take(),
                loading: false,
            });
        }
    }
}

impl<D, S> SessionStore<D, S>
where
    D: IdentityDirectory,
    S: KeyValueStorage,
{
    pub fn new(directory: D, storage: S) -> Self {
        let (state, _) = watch::channel(Session::loading());
        Self {
            directory,
            storage,
            state,
        }
    }

    /// Follow session changes.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn session(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().is_loading()
    }

    /// Evaluate a permission against the current session.
    pub fn can(&self, permission: Permission, unit_id: Option<&UnitId>) -> bool {
        authorize::can(&self.state.borrow(), permission, unit_id)
    }

    /// Rehydrate the session from durable storage.
    ///
    /// Never fails: an unreadable or corrupted entry results in no session, and
    /// a corrupted entry is removed.
    pub async fn restore(&self) -> Session {
        let guard = LoadingGuard::begin(&self.state);

        let identity = match self.storage.get(SESSION_STORAGE_KEY).await {
            Ok(Some(raw)) => match decode_identity(&raw) {
                Ok(identity) => Some(identity),
                Err(reason) => {
                    tracing::warn!(%reason, "discarding corrupted session entry");
                    if let Err(err) = self.storage.remove(SESSION_STORAGE_KEY).await {
                        tracing::warn!(error = %err, "failed to remove corrupted session entry");
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(error = %err, "session storage unreadable; starting signed out");
                None
            }
        };

        match &identity {
            Some(identity) => tracing::info!(identity_id = %identity.id, "session restored"),
            None => tracing::debug!("no session to restore"),
        }

        guard.settle(identity)
    }

    /// Sign in. On any failure the previous session is left in place.
    pub async fn login(&self, email: &str, secret: &str) -> Result<Identity, SessionError> {
        let guard = LoadingGuard::begin(&self.state);

        match self.authenticate(email, secret).await {
            Ok(identity) => {
                tracing::info!(identity_id = %identity.id, role = %identity.role_label, "login succeeded");
                guard.settle(Some(identity.clone()));
                Ok(identity)
            }
            Err(err) => {
                tracing::info!(error = %err, "login failed");
                // Dropping the guard restores the previous session.
                drop(guard);
                Err(err)
            }
        }
    }

    async fn authenticate(&self, email: &str, secret: &str) -> Result<Identity, SessionError> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(SessionError::InvalidCredentials);
        }

        let mut identity = self
            .directory
            .find_by_email(&email)
            .await?
            .ok_or(SessionError::InvalidCredentials)?;

        if !self.directory.verify_secret(&identity, secret).await? {
            return Err(SessionError::InvalidCredentials);
        }

        if identity.status != AccountStatus::Active {
            return Err(SessionError::AccountNotActive(identity.status));
        }

        identity.validate()?;

        let now = Utc::now();
        identity.last_login_at = Some(now);
        if let Err(err) = self.directory.record_login(identity.id, now).await {
            tracing::warn!(identity_id = %identity.id, error = %err, "failed to record last login");
        }

        let raw = serde_json::to_string(&identity)
            .map_err(|e| StorageError::Backend(format!("serialize identity: {e}")))?;
        self.storage.set(SESSION_STORAGE_KEY, &raw).await?;

        Ok(identity)
    }

    /// Sign out. Calling it without a session is a no-op.
    ///
    /// The in-memory session is cleared even if the durable entry cannot be
    /// removed; that failure is reported so the caller can retry.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let previous = self.state.send_replace(Session::anonymous());
        if let Some(identity) = previous.identity {
            tracing::info!(identity_id = %identity.id, "logged out");
        }

        self.storage.remove(SESSION_STORAGE_KEY).await?;
        Ok(())
    }
}

fn decode_identity(raw: &str) -> Result<Identity, String> {
    let identity: Identity = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    identity.validate().map_err(|e| e.to_string())?;
    Ok(identity)
}
