//! Synchronized record types: zones, praesidia, members and officers.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use curia_core::{Entity, EntityKind, RecordId, UnitId};

use crate::entity::SyncEntity;

/// Field is present in the payload: `null` becomes `Some(None)`, a value
/// `Some(Some(_))`. Absent fields fall back to `default` (`None`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

macro_rules! impl_entity {
    ($t:ty) => {
        impl Entity for $t {
            type Id = RecordId;

            fn id(&self) -> &Self::Id {
                &self.id
            }
        }
    };
}

// ─────────────────────────────────────────────────────────────────────────────
// Zone
// ─────────────────────────────────────────────────────────────────────────────

/// Top-level area grouping praesidia.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    pub id: RecordId,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneDraft {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZonePatch {
    #[serde(default)]
    pub name: Option<String>,
}

impl_entity!(Zone);

impl SyncEntity for Zone {
    const KIND: EntityKind = EntityKind::Zone;
    type Draft = ZoneDraft;
    type Patch = ZonePatch;

    fn parent_id(&self) -> Option<RecordId> {
        None
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn materialize(id: RecordId, draft: ZoneDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: ZonePatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        self.updated_at = now;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Praesidium
// ─────────────────────────────────────────────────────────────────────────────

/// A unit: the group unit officers are scoped to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Praesidium {
    pub id: RecordId,
    pub zone_id: RecordId,
    pub name: String,
    pub parish: String,
    #[serde(default)]
    pub meeting_day: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Praesidium {
    /// The unit id officers of this praesidium are bound to.
    pub fn unit_id(&self) -> UnitId {
        UnitId::from(self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PraesidiumDraft {
    pub zone_id: RecordId,
    pub name: String,
    pub parish: String,
    #[serde(default)]
    pub meeting_day: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PraesidiumPatch {
    #[serde(default)]
    pub zone_id: Option<RecordId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub parish: Option<String>,
    /// Omitted leaves the meeting day as is; `null` (`Some(None)`) clears it.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub meeting_day: Option<Option<String>>,
}

impl_entity!(Praesidium);

impl SyncEntity for Praesidium {
    const KIND: EntityKind = EntityKind::Praesidium;
    type Draft = PraesidiumDraft;
    type Patch = PraesidiumPatch;

    fn draft_parent(draft: &PraesidiumDraft) -> Option<RecordId> {
        Some(draft.zone_id)
    }

    fn patch_parent(patch: &PraesidiumPatch) -> Option<RecordId> {
        patch.zone_id
    }

    fn parent_id(&self) -> Option<RecordId> {
        Some(self.zone_id)
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn materialize(id: RecordId, draft: PraesidiumDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            zone_id: draft.zone_id,
            name: draft.name,
            parish: draft.parish,
            meeting_day: draft.meeting_day,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: PraesidiumPatch, now: DateTime<Utc>) {
        if let Some(zone_id) = patch.zone_id {
            self.zone_id = zone_id;
        }
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(parish) = patch.parish {
            self.parish = parish;
        }
        if let Some(meeting_day) = patch.meeting_day {
            self.meeting_day = meeting_day;
        }
        self.updated_at = now;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Member
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MembershipKind {
    #[default]
    Active,
    Auxiliary,
    Probationary,
}

/// Roster entry of a praesidium.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: RecordId,
    pub praesidium_id: RecordId,
    pub full_name: String,
    pub membership: MembershipKind,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub joined_on: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDraft {
    pub praesidium_id: RecordId,
    pub full_name: String,
    #[serde(default)]
    pub membership: MembershipKind,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub joined_on: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberPatch {
    #[serde(default)]
    pub praesidium_id: Option<RecordId>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub membership: Option<MembershipKind>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub phone: Option<Option<String>>,
}

impl_entity!(Member);

impl SyncEntity for Member {
    const KIND: EntityKind = EntityKind::Member;
    type Draft = MemberDraft;
    type Patch = MemberPatch;

    fn draft_parent(draft: &MemberDraft) -> Option<RecordId> {
        Some(draft.praesidium_id)
    }

    fn patch_parent(patch: &MemberPatch) -> Option<RecordId> {
        patch.praesidium_id
    }

    fn parent_id(&self) -> Option<RecordId> {
        Some(self.praesidium_id)
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn materialize(id: RecordId, draft: MemberDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            praesidium_id: draft.praesidium_id,
            full_name: draft.full_name,
            membership: draft.membership,
            phone: draft.phone,
            joined_on: draft.joined_on,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: MemberPatch, now: DateTime<Utc>) {
        if let Some(praesidium_id) = patch.praesidium_id {
            self.praesidium_id = praesidium_id;
        }
        if let Some(full_name) = patch.full_name {
            self.full_name = full_name;
        }
        if let Some(membership) = patch.membership {
            self.membership = membership;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
        self.updated_at = now;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Officer
// ─────────────────────────────────────────────────────────────────────────────

/// Office held in a praesidium for a term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Officer {
    pub id: RecordId,
    pub praesidium_id: RecordId,
    pub full_name: String,
    /// Position label, e.g. "Secrétaire".
    pub position: String,
    #[serde(default)]
    pub term_start: Option<NaiveDate>,
    #[serde(default)]
    pub term_end: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerDraft {
    pub praesidium_id: RecordId,
    pub full_name: String,
    pub position: String,
    #[serde(default)]
    pub term_start: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfficerPatch {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub position: Option<String>,
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub term_end: Option<Option<NaiveDate>>,
}

impl_entity!(Officer);

impl SyncEntity for Officer {
    const KIND: EntityKind = EntityKind::Officer;
    type Draft = OfficerDraft;
    type Patch = OfficerPatch;

    fn draft_parent(draft: &OfficerDraft) -> Option<RecordId> {
        Some(draft.praesidium_id)
    }

    fn parent_id(&self) -> Option<RecordId> {
        Some(self.praesidium_id)
    }

    fn sort_key(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn materialize(id: RecordId, draft: OfficerDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            praesidium_id: draft.praesidium_id,
            full_name: draft.full_name,
            position: draft.position,
            term_start: draft.term_start,
            term_end: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply_patch(&mut self, patch: OfficerPatch, now: DateTime<Utc>) {
        if let Some(full_name) = patch.full_name {
            self.full_name = full_name;
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(term_end) = patch.term_end {
            self.term_end = term_end;
        }
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn praesidium_patch_clears_meeting_day() {
        let now = Utc::now();
        let mut praesidium = Praesidium::materialize(
            RecordId::new(),
            PraesidiumDraft {
                zone_id: RecordId::new(),
                name: "Notre-Dame de la Paix".to_string(),
                parish: "Saint-Joseph".to_string(),
                meeting_day: Some("mardi".to_string()),
            },
            now,
        );

        praesidium.apply_patch(
            PraesidiumPatch {
                meeting_day: Some(None),
                ..Default::default()
            },
            now,
        );

        assert_eq!(praesidium.meeting_day, None);
        assert_eq!(praesidium.name, "Notre-Dame de la Paix");
    }

    #[test]
    fn filter_matches_on_parent() {
        let parent = RecordId::new();
        let member = Member::materialize(
            RecordId::new(),
            MemberDraft {
                praesidium_id: parent,
                full_name: "Claire".to_string(),
                membership: MembershipKind::Auxiliary,
                phone: None,
                joined_on: None,
            },
            Utc::now(),
        );

        assert!(member.matches(None));
        assert!(member.matches(Some(parent)));
        assert!(!member.matches(Some(RecordId::new())));
    }

    #[test]
    fn member_patch_omitted_fields_deserialize_as_untouched() {
        let patch: MemberPatch = serde_json::from_str(r#"{"full_name":"Claire B."}"#).unwrap();
        assert_eq!(patch.full_name.as_deref(), Some("Claire B."));
        assert!(patch.phone.is_none());
        assert!(patch.membership.is_none());
    }

    #[test]
    fn null_clears_and_omission_keeps() {
        let clear: MemberPatch = serde_json::from_str(r#"{"phone":null}"#).unwrap();
        assert_eq!(clear.phone, Some(None));

        let keep: MemberPatch = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(keep.phone, None);

        let set: MemberPatch = serde_json::from_str(r#"{"phone":"+33 1 23 45 67 89"}"#).unwrap();
        assert_eq!(set.phone, Some(Some("+33 1 23 45 67 89".to_string())));

        let day: PraesidiumPatch = serde_json::from_str(r#"{"meeting_day":null}"#).unwrap();
        assert_eq!(day.meeting_day, Some(None));

        let term: OfficerPatch = serde_json::from_str(r#"{"term_end":null}"#).unwrap();
        assert_eq!(term.term_end, Some(None));
    }

    #[test]
    fn clearing_patch_survives_the_wire() {
        let patch = OfficerPatch {
            term_end: Some(None),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert!(json.contains(r#""term_end":null"#));
        assert_eq!(serde_json::from_str::<OfficerPatch>(&json).unwrap(), patch);

        let untouched = serde_json::to_string(&OfficerPatch::default()).unwrap();
        assert!(!untouched.contains("term_end"));
    }

    #[test]
    fn praesidium_unit_id_is_its_record_id() {
        let praesidium = Praesidium::materialize(
            RecordId::new(),
            PraesidiumDraft {
                zone_id: RecordId::new(),
                name: "Reine des Apôtres".to_string(),
                parish: "Sainte-Anne".to_string(),
                meeting_day: None,
            },
            Utc::now(),
        );
        assert_eq!(praesidium.unit_id().as_str(), praesidium.id.to_string());
    }
}
