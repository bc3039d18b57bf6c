//! Entity trait and the kinds of records kept in sync with the remote store.

use serde::{Deserialize, Serialize};

/// Entity marker + minimal interface.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;
}

/// Kind of a synchronized record.
///
/// Change notifications are scoped by kind: a subscriber for `Member` never
/// hears about `Zone` changes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Zone,
    Praesidium,
    Member,
    Officer,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::Zone,
        EntityKind::Praesidium,
        EntityKind::Member,
        EntityKind::Officer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Zone => "zone",
            EntityKind::Praesidium => "praesidium",
            EntityKind::Member => "member",
            EntityKind::Officer => "officer",
        }
    }
}

impl core::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
