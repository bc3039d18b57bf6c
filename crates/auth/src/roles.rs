//! Role labels and the static role → permission table.

use serde::{Deserialize, Serialize};

use crate::permissions::{Permission, PermissionSet};

/// Organizational level a role operates at.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleScope {
    Council,
    Unit,
}

/// Known officer positions.
///
/// Identities carry their position as a free-form label; [`Role::from_label`]
/// resolves it. Labels that resolve to nothing grant nothing.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    CouncilPresident,
    CouncilVicePresident,
    CouncilSecretary,
    CouncilTreasurer,
    President,
    VicePresident,
    Secretary,
    Treasurer,
}

use Permission::*;

const COUNCIL_PRESIDENT: &[Permission] = &[
    ViewAllUnits,
    ViewAllPraesidia,
    ManagePraesidia,
    ViewMembers,
    ManageMembers,
    ViewOfficers,
    ManageOfficers,
    ViewFinances,
    ManageFinances,
    ApproveFinances,
    ApproveAccounts,
    ManageEvents,
    ViewReports,
];

const COUNCIL_VICE_PRESIDENT: &[Permission] = &[
    ViewAllUnits,
    ViewAllPraesidia,
    ManagePraesidia,
    ViewMembers,
    ManageMembers,
    ViewOfficers,
    ManageOfficers,
    ViewFinances,
    ManageEvents,
    ViewReports,
];

const COUNCIL_SECRETARY: &[Permission] = &[
    ViewAllUnits,
    ViewAllPraesidia,
    ViewMembers,
    ManageMembers,
    ViewOfficers,
    ManageEvents,
    ViewReports,
];

const COUNCIL_TREASURER: &[Permission] = &[
    ViewAllUnits,
    ViewAllPraesidia,
    ViewFinances,
    ManageFinances,
    ApproveFinances,
    ViewReports,
];

const PRESIDENT: &[Permission] = &[
    ViewMembers,
    ManageMembers,
    ViewOfficers,
    ManageOfficers,
    ViewFinances,
    ManageEvents,
    ViewReports,
];

const VICE_PRESIDENT: &[Permission] = &[ViewMembers, ManageMembers, ViewOfficers, ManageEvents];

const SECRETARY: &[Permission] = &[ViewMembers, ManageMembers, ManageEvents, ViewReports];

const TREASURER: &[Permission] = &[ViewMembers, ViewFinances, ManageFinances];

impl Role {
    pub const ALL: [Role; 8] = [
        Role::CouncilPresident,
        Role::CouncilVicePresident,
        Role::CouncilSecretary,
        Role::CouncilTreasurer,
        Role::President,
        Role::VicePresident,
        Role::Secretary,
        Role::Treasurer,
    ];

    /// The position label as stored on identities.
    pub fn label(&self) -> &'static str {
        match self {
            Role::CouncilPresident => "Président du Conseil",
            Role::CouncilVicePresident => "Vice-Président du Conseil",
            Role::CouncilSecretary => "Secrétaire du Conseil",
            Role::CouncilTreasurer => "Trésorier du Conseil",
            Role::President => "Président",
            Role::VicePresident => "Vice-Président",
            Role::Secretary => "Secrétaire",
            Role::Treasurer => "Trésorier",
        }
    }

    /// Resolve a stored label. Surrounding whitespace is ignored; otherwise the
    /// match is exact.
    pub fn from_label(label: &str) -> Option<Role> {
        let label = label.trim();
        Role::ALL.into_iter().find(|role| role.label() == label)
    }

    pub fn scope(&self) -> RoleScope {
        match self {
            Role::CouncilPresident
            | Role::CouncilVicePresident
            | Role::CouncilSecretary
            | Role::CouncilTreasurer => RoleScope::Council,
            Role::President | Role::VicePresident | Role::Secretary | Role::Treasurer => {
                RoleScope::Unit
            }
        }
    }

    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::CouncilPresident => COUNCIL_PRESIDENT,
            Role::CouncilVicePresident => COUNCIL_VICE_PRESIDENT,
            Role::CouncilSecretary => COUNCIL_SECRETARY,
            Role::CouncilTreasurer => COUNCIL_TREASURER,
            Role::President => PRESIDENT,
            Role::VicePresident => VICE_PRESIDENT,
            Role::Secretary => SECRETARY,
            Role::Treasurer => TREASURER,
        }
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

/// Permissions granted to a role label.
///
/// Unknown labels yield the empty set (fail closed).
pub fn permissions_for(role_label: &str) -> PermissionSet {
    Role::from_label(role_label)
        .map(|role| role.permissions().iter().copied().collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn council_president_can_approve_accounts() {
        assert!(permissions_for("Président du Conseil").contains(&ApproveAccounts));
    }

    #[test]
    fn unit_president_cannot_view_all_praesidia() {
        let perms = permissions_for("Président");
        assert!(!perms.contains(&ViewAllPraesidia));
        assert!(perms.contains(&ManageMembers));
    }

    #[test]
    fn unknown_label_grants_nothing() {
        assert!(permissions_for("Grand Chambellan").is_empty());
        assert!(permissions_for("").is_empty());
        assert!(permissions_for("président").is_empty());
    }

    #[test]
    fn labels_are_trimmed() {
        assert_eq!(Role::from_label("  Trésorier  "), Some(Role::Treasurer));
    }

    #[test]
    fn labels_are_unique() {
        for role in Role::ALL {
            assert_eq!(Role::from_label(role.label()), Some(role));
        }
    }

    #[test]
    fn every_role_grants_something() {
        for role in Role::ALL {
            assert!(!role.permissions().is_empty(), "{role} grants nothing");
        }
    }
}
