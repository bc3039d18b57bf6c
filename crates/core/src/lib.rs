//! `curia-core`: shared identifiers and domain primitives.
//!
//! This crate contains **pure domain** primitives (no IO, no async).

pub mod entity;
pub mod error;
pub mod id;

pub use entity::{Entity, EntityKind};
pub use error::{DomainError, DomainResult};
pub use id::{IdentityId, RecordId, UnitId};
