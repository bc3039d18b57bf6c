use core::str::FromStr;
use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use curia_core::DomainError;

/// Capability token gating one class of action.
///
/// The set is closed: a misspelled permission is a compile error rather than a
/// silently failing check. Tokens are flat; no permission implies another.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
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
}

/// A role's granted permissions.
pub type PermissionSet = BTreeSet<Permission>;

impl Permission {
    pub const ALL: [Permission; 13] = [
        Permission::ViewAllUnits,
        Permission::ViewAllPraesidia,
        Permission::ManagePraesidia,
        Permission::ViewMembers,
        Permission::ManageMembers,
        Permission::ViewOfficers,
        Permission::ManageOfficers,
        Permission::ViewFinances,
        Permission::ManageFinances,
        Permission::ApproveFinances,
        Permission::ApproveAccounts,
        Permission::ManageEvents,
        Permission::ViewReports,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::ViewAllUnits => "view_all_units",
            Permission::ViewAllPraesidia => "view_all_praesidia",
            Permission::ManagePraesidia => "manage_praesidia",
            Permission::ViewMembers => "view_members",
            Permission::ManageMembers => "manage_members",
            Permission::ViewOfficers => "view_officers",
            Permission::ManageOfficers => "manage_officers",
            Permission::ViewFinances => "view_finances",
            Permission::ManageFinances => "manage_finances",
            Permission::ApproveFinances => "approve_finances",
            Permission::ApproveAccounts => "approve_accounts",
            Permission::ManageEvents => "manage_events",
            Permission::ViewReports => "view_reports",
        }
    }

    /// Grouping used by audit/display screens.
    pub fn category(&self) -> &'static str {
        match self {
            Permission::ViewAllUnits
            | Permission::ViewAllPraesidia
            | Permission::ManagePraesidia => "units",
            Permission::ViewMembers | Permission::ManageMembers => "members",
            Permission::ViewOfficers | Permission::ManageOfficers | Permission::ApproveAccounts => {
                "officers"
            }
            Permission::ViewFinances | Permission::ManageFinances | Permission::ApproveFinances => {
                "finances"
            }
            Permission::ManageEvents => "events",
            Permission::ViewReports => "reports",
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown permission '{s}'")))
    }
}
