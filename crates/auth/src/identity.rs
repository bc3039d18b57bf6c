//! Officer identities and their account lifecycle.
//!
//! # Invariants
//! - A unit officer always carries the id of the unit they serve.
//! - A council officer is never scoped to a unit.
//! - Only active accounts may open a session (enforced by the session store).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use curia_core::{DomainError, DomainResult, IdentityId, UnitId};

use crate::permissions::PermissionSet;
use crate::roles::{Role, permissions_for};

// ─────────────────────────────────────────────────────────────────────────────
// Account kind / status
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    /// Organization-wide authority.
    CouncilOfficer,
    /// Authority limited to one unit.
    UnitOfficer,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccountStatus {
    /// Registered, waiting for council approval.
    #[default]
    Pending,
    Active,
    Suspended,
}

impl core::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AccountStatus::Pending => write!(f, "pending"),
            AccountStatus::Active => write!(f, "active"),
            AccountStatus::Suspended => write!(f, "suspended"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// An officer account as known to the identity directory.
///
/// Fields are public for transport; anything crossing a trust boundary
/// (directory lookups, restored sessions) goes through [`Identity::validate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    pub display_name: String,
    /// Free-form position, e.g. "Président du Conseil".
    pub role_label: String,
    pub account_kind: AccountKind,
    pub status: AccountStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_id: Option<UnitId>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<IdentityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_at: Option<DateTime<Utc>>,
}

impl Identity {
    /// New pending council officer.
    pub fn council_officer(
        email: impl Into<String>,
        display_name: impl Into<String>,
        role_label: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::build(
            email.into(),
            display_name.into(),
            role_label.into(),
            AccountKind::CouncilOfficer,
            None,
            created_at,
        )
    }

    /// New pending unit officer serving `unit_id`.
    pub fn unit_officer(
        email: impl Into<String>,
        display_name: impl Into<String>,
        role_label: impl Into<String>,
        unit_id: UnitId,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        Self::build(
            email.into(),
            display_name.into(),
            role_label.into(),
            AccountKind::UnitOfficer,
            Some(unit_id),
            created_at,
        )
    }

    fn build(
        email: String,
        display_name: String,
        role_label: String,
        account_kind: AccountKind,
        unit_id: Option<UnitId>,
        created_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let identity = Self {
            id: IdentityId::new(),
            email: normalize_email(&email),
            display_name: display_name.trim().to_string(),
            role_label: role_label.trim().to_string(),
            account_kind,
            status: AccountStatus::Pending,
            unit_id,
            created_at,
            last_login_at: None,
            approved_by: None,
            approved_at: None,
        };
        identity.validate()?;
        Ok(identity)
    }

    /// Check the structural invariants.
    pub fn validate(&self) -> DomainResult<()> {
        if self.email.is_empty() || !self.email.contains('@') {
            return Err(DomainError::validation("invalid email format"));
        }
        if self.display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }
        match (self.account_kind, &self.unit_id) {
            (AccountKind::UnitOfficer, None) => {
                Err(DomainError::invariant("unit officer without a unit"))
            }
            (AccountKind::CouncilOfficer, Some(_)) => {
                Err(DomainError::invariant("council officer scoped to a unit"))
            }
            _ => Ok(()),
        }
    }

    pub fn role(&self) -> Option<Role> {
        Role::from_label(&self.role_label)
    }

    pub fn permissions(&self) -> PermissionSet {
        permissions_for(&self.role_label)
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Approve a pending account.
    pub fn approve(&mut self, approver: IdentityId, at: DateTime<Utc>) -> DomainResult<()> {
        if self.status != AccountStatus::Pending {
            return Err(DomainError::invariant(format!(
                "only pending accounts can be approved (account is {})",
                self.status
            )));
        }
        if approver == self.id {
            return Err(DomainError::invariant("an account cannot approve itself"));
        }
        self.status = AccountStatus::Active;
        self.approved_by = Some(approver);
        self.approved_at = Some(at);
        Ok(())
    }

    pub fn suspend(&mut self) -> DomainResult<()> {
        if self.status != AccountStatus::Active {
            return Err(DomainError::invariant(format!(
                "only active accounts can be suspended (account is {})",
                self.status
            )));
        }
        self.status = AccountStatus::Suspended;
        Ok(())
    }

    pub fn reactivate(&mut self) -> DomainResult<()> {
        if self.status != AccountStatus::Suspended {
            return Err(DomainError::invariant(format!(
                "only suspended accounts can be reactivated (account is {})",
                self.status
            )));
        }
        self.status = AccountStatus::Active;
        Ok(())
    }
}

/// Canonical form used for directory lookups.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn unit_officer_requires_a_unit() {
        let mut identity =
            Identity::unit_officer("anne@example.org", "Anne", "Président", UnitId::new("1"), now())
                .unwrap();
        identity.unit_id = None;

        let err = identity.validate().unwrap_err();
        assert!(err.to_string().contains("unit"));
    }

    #[test]
    fn council_officer_cannot_be_unit_scoped() {
        let mut identity =
            Identity::council_officer("paul@example.org", "Paul", "Président du Conseil", now())
                .unwrap();
        identity.unit_id = Some(UnitId::new("7"));
        assert!(identity.validate().is_err());
    }

    #[test]
    fn email_is_normalized() {
        let identity =
            Identity::council_officer("  Paul@Example.ORG ", "Paul", "Secrétaire du Conseil", now())
                .unwrap();
        assert_eq!(identity.email, "paul@example.org");
    }

    #[test]
    fn invalid_email_is_rejected() {
        assert!(Identity::council_officer("paul", "Paul", "Président du Conseil", now()).is_err());
    }

    #[test]
    fn approval_activates_and_stamps_approver() {
        let approver = IdentityId::new();
        let at = now();
        let mut identity =
            Identity::unit_officer("luc@example.org", "Luc", "Trésorier", UnitId::new("3"), now())
                .unwrap();

        identity.approve(approver, at).unwrap();

        assert!(identity.is_active());
        assert_eq!(identity.approved_by, Some(approver));
        assert_eq!(identity.approved_at, Some(at));
        assert!(identity.approve(approver, at).is_err());
    }

    #[test]
    fn self_approval_is_rejected() {
        let mut identity =
            Identity::council_officer("marc@example.org", "Marc", "Président du Conseil", now())
                .unwrap();
        let own_id = identity.id;
        assert!(identity.approve(own_id, now()).is_err());
        assert_eq!(identity.status, AccountStatus::Pending);
    }

    #[test]
    fn suspend_and_reactivate() {
        let mut identity =
            Identity::council_officer("rose@example.org", "Rose", "Trésorier du Conseil", now())
                .unwrap();
        assert!(identity.suspend().is_err());

        identity.approve(IdentityId::new(), now()).unwrap();
        identity.suspend().unwrap();
        assert_eq!(identity.status, AccountStatus::Suspended);

        identity.reactivate().unwrap();
        assert!(identity.is_active());
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let identity =
            Identity::council_officer("jean@example.org", "Jean", "Président du Conseil", now())
                .unwrap();
        let json = serde_json::to_value(&identity).unwrap();
        assert!(json.get("unit_id").is_none());
        assert_eq!(json["account_kind"], "council_officer");
        assert_eq!(json["status"], "pending");
    }
}
