use serde::{Deserialize, Serialize};

use curia_core::EntityKind;

/// What happened to a record, as reported by the remote store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOp {
    Insert,
    Update,
    Delete,
}

/// A payload-free change notification.
///
/// `op` is informational (logging); subscribers must not assume they can
/// reconstruct state from it.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeNotice {
    pub kind: EntityKind,
    pub op: ChangeOp,
}

impl ChangeNotice {
    pub fn new(kind: EntityKind, op: ChangeOp) -> Self {
        Self { kind, op }
    }
}
