//! `curia-client`: wiring for an officer's device: configuration, durable
//! session storage and permission-checked access to synchronized collections.

pub mod config;
pub mod storage;
pub mod workspace;

pub use config::ClientConfig;
pub use storage::SqliteStorage;
pub use workspace::{OpenError, ScopedCollection, Workspace, WriteError, manage_permission, view_permission};
