//! `curia-auth`: role-scoped authorization and the session lifecycle.
//!
//! The evaluator is pure; IO lives behind the directory and storage traits.

pub mod authorize;
pub mod directory;
pub mod guard;
pub mod identity;
pub mod permissions;
pub mod roles;
pub mod session;
pub mod storage;

pub use authorize::{AuthorizationExplanation, DenialKind, RbacRegistry, can, explain_authorization};
pub use directory::{DirectoryError, IdentityDirectory, InMemoryIdentityDirectory};
pub use guard::{GuardOutcome, PublicOnlyGuard, RouteGuard, can_any};
pub use identity::{AccountKind, AccountStatus, Identity};
pub use permissions::{Permission, PermissionSet};
pub use roles::{Role, RoleScope, permissions_for};
pub use session::{SESSION_STORAGE_KEY, Session, SessionError, SessionPhase, SessionStore};
pub use storage::{InMemoryStorage, KeyValueStorage, StorageError};
