//! `curia-sync`: live, locally held views of remote record collections.
//!
//! A [`SyncedCollection`] fetches one filtered collection, listens for change
//! notices of its entity kind and re-fetches when one arrives. Mutations go to
//! the remote store first and touch local state only once confirmed.

pub mod collection;
pub mod entity;
pub mod memory_store;
pub mod records;
pub mod store;

pub use collection::{CollectionState, SyncedCollection};
pub use entity::SyncEntity;
pub use memory_store::InMemoryEntityStore;
pub use records::{
    Member, MemberDraft, MemberPatch, MembershipKind, Officer, OfficerDraft, OfficerPatch,
    Praesidium, PraesidiumDraft, PraesidiumPatch, Zone, ZoneDraft, ZonePatch,
};
pub use store::{EntityStore, StoreError};
