use std::collections::BTreeMap;

use serde::Serialize;

use curia_core::{IdentityId, UnitId};

use crate::identity::{AccountKind, Identity};
use crate::permissions::Permission;
use crate::roles::{Role, RoleScope};
use crate::session::Session;

/// Decide whether the session may perform `permission`, optionally within a unit.
///
/// - No IO
/// - No panics
/// - Single permission only; callers needing "any of" combine results themselves
///
/// A unit officer asking about another unit's scope is denied even when the
/// role grants the permission. Council officers ignore the unit argument.
pub fn can(session: &Session, permission: Permission, unit_id: Option<&UnitId>) -> bool {
    match session.identity() {
        Some(identity) => identity_can(identity, permission, unit_id),
        None => false,
    }
}

/// Same decision as [`can`], for an identity already in hand.
pub fn identity_can(identity: &Identity, permission: Permission, unit_id: Option<&UnitId>) -> bool {
    if !identity.permissions().contains(&permission) {
        return false;
    }

    match (identity.account_kind, unit_id) {
        (AccountKind::UnitOfficer, Some(requested)) => identity.unit_id.as_ref() == Some(requested),
        _ => true,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization Explanation (Audit Trail)
// ─────────────────────────────────────────────────────────────────────────────

/// Detailed explanation of an authorization decision.
///
/// `granted` always agrees with [`can`] for the same inputs.
#[derive(Debug, Clone, Serialize)]
pub struct AuthorizationExplanation {
    pub required_permission: Permission,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_unit: Option<UnitId>,
    pub granted: bool,
    /// Human-readable reason for the decision.
    pub reason: String,
    /// The session identity, when there is one.
    pub principal: Option<PrincipalState>,
    pub denial_reason: Option<DenialReason>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PrincipalState {
    pub identity_id: IdentityId,
    pub role_label: String,
    pub account_kind: AccountKind,
    pub unit_id: Option<UnitId>,
    pub effective_permissions: Vec<Permission>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DenialReason {
    pub kind: DenialKind,
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    NoSession,
    MissingPermission,
    UnitScopeMismatch,
}

/// Explain why `can(session, required, unit_id)` comes out the way it does.
pub fn explain_authorization(
    session: &Session,
    required: Permission,
    unit_id: Option<&UnitId>,
) -> AuthorizationExplanation {
    let requested_unit = unit_id.cloned();

    let Some(identity) = session.identity() else {
        return AuthorizationExplanation {
            required_permission: required,
            requested_unit,
            granted: false,
            reason: "No active session".to_string(),
            principal: None,
            denial_reason: Some(DenialReason {
                kind: DenialKind::NoSession,
                message: "Sign in before attempting this action".to_string(),
                suggestions: vec!["Log in with an active officer account".to_string()],
            }),
        };
    };

    let effective = identity.permissions();
    let principal = PrincipalState {
        identity_id: identity.id,
        role_label: identity.role_label.clone(),
        account_kind: identity.account_kind,
        unit_id: identity.unit_id.clone(),
        effective_permissions: effective.iter().copied().collect(),
    };

    if !effective.contains(&required) {
        let registry = RbacRegistry::build();
        let granting = registry.roles_granting(required);
        let mut suggestions = Vec::new();
        if identity.role().is_none() {
            suggestions.push(format!(
                "Role label '{}' is not a known position; it grants no permissions",
                identity.role_label
            ));
        }
        if !granting.is_empty() {
            suggestions.push(format!("Positions granting '{required}': {}", granting.join(", ")));
        }

        return AuthorizationExplanation {
            required_permission: required,
            requested_unit,
            granted: false,
            reason: format!(
                "Role '{}' does not grant '{required}'",
                identity.role_label
            ),
            principal: Some(principal),
            denial_reason: Some(DenialReason {
                kind: DenialKind::MissingPermission,
                message: format!("Missing required permission: '{required}'"),
                suggestions,
            }),
        };
    }

    if let (AccountKind::UnitOfficer, Some(requested)) = (identity.account_kind, unit_id) {
        if identity.unit_id.as_ref() != Some(requested) {
            let own = identity
                .unit_id
                .as_ref()
                .map(UnitId::to_string)
                .unwrap_or_default();
            return AuthorizationExplanation {
                required_permission: required,
                requested_unit,
                granted: false,
                reason: format!("Unit officer of '{own}' cannot act on unit '{requested}'"),
                principal: Some(principal),
                denial_reason: Some(DenialReason {
                    kind: DenialKind::UnitScopeMismatch,
                    message: "Unit officers are limited to their own unit".to_string(),
                    suggestions: vec![
                        "Ask a council officer to perform this action".to_string(),
                    ],
                }),
            };
        }
    }

    let reason = match (identity.account_kind, unit_id) {
        (AccountKind::CouncilOfficer, Some(_)) => {
            format!("Council role grants '{required}' for every unit")
        }
        (AccountKind::UnitOfficer, Some(requested)) => {
            format!("Role grants '{required}' within own unit '{requested}'")
        }
        (_, None) => format!("Role '{}' grants '{required}'", identity.role_label),
    };

    AuthorizationExplanation {
        required_permission: required,
        requested_unit,
        granted: true,
        reason,
        principal: Some(principal),
        denial_reason: None,
    }
}

/// Role definition with its granted permissions (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct RoleDefinition {
    pub role: Role,
    pub label: &'static str,
    pub scope: RoleScope,
    pub permissions: Vec<Permission>,
}

/// Permission definition (for audit/display).
#[derive(Debug, Clone, Serialize)]
pub struct PermissionDefinition {
    pub permission: Permission,
    pub category: &'static str,
    /// Labels of the positions granting this permission.
    pub granted_by: Vec<&'static str>,
}

/// Registry of all positions and permissions.
#[derive(Debug, Clone, Serialize)]
pub struct RbacRegistry {
    pub roles: BTreeMap<Role, RoleDefinition>,
    pub permissions: BTreeMap<Permission, PermissionDefinition>,
}

impl RbacRegistry {
    pub fn build() -> Self {
        let roles = Role::ALL
            .into_iter()
            .map(|role| {
                (
                    role,
                    RoleDefinition {
                        role,
                        label: role.label(),
                        scope: role.scope(),
                        permissions: role.permissions().to_vec(),
                    },
                )
            })
            .collect();

        let permissions = Permission::ALL
            .into_iter()
            .map(|permission| {
                let granted_by = Role::ALL
                    .into_iter()
                    .filter(|role| role.grants(permission))
                    .map(|role| role.label())
                    .collect();
                (
                    permission,
                    PermissionDefinition {
                        permission,
                        category: permission.category(),
                        granted_by,
                    },
                )
            })
            .collect();

        Self { roles, permissions }
    }

    pub fn roles_granting(&self, permission: Permission) -> Vec<&'static str> {
        self.permissions
            .get(&permission)
            .map(|definition| definition.granted_by.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;

    fn active(mut identity: Identity) -> Identity {
        identity.approve(IdentityId::new(), Utc::now()).unwrap();
        identity
    }

    fn council(role_label: &str) -> Session {
        let identity =
            Identity::council_officer("conseil@example.org", "Conseil", role_label, Utc::now()).unwrap();
        Session::authenticated(active(identity))
    }

    fn unit(role_label: &str, unit_id: &str) -> Session {
        let identity = Identity::unit_officer(
            "praesidium@example.org",
            "Officier",
            role_label,
            UnitId::new(unit_id),
            Utc::now(),
        )
        .unwrap();
        Session::authenticated(active(identity))
    }

    #[test]
    fn no_session_is_denied() {
        assert!(!can(&Session::anonymous(), Permission::ViewMembers, None));
        assert!(!can(&Session::loading(), Permission::ViewMembers, None));
    }

    #[test]
    fn council_president_approves_accounts_in_any_scope() {
        let session = council("Président du Conseil");
        assert!(can(&session, Permission::ApproveAccounts, None));
        assert!(can(&session, Permission::ApproveAccounts, Some(&UnitId::new("unit-42"))));
    }

    #[test]
    fn unit_president_lacks_view_all_praesidia_regardless_of_unit() {
        let session = unit("Président", "1");
        assert!(!can(&session, Permission::ViewAllPraesidia, None));
        assert!(!can(&session, Permission::ViewAllPraesidia, Some(&UnitId::new("1"))));
        assert!(!can(&session, Permission::ViewAllPraesidia, Some(&UnitId::new("2"))));
    }

    #[test]
    fn unit_officer_is_confined_to_own_unit() {
        let session = unit("Président", "1");
        assert!(can(&session, Permission::ManageMembers, Some(&UnitId::new("1"))));
        assert!(!can(&session, Permission::ManageMembers, Some(&UnitId::new("2"))));
        assert!(can(&session, Permission::ManageMembers, None));
    }

    #[test]
    fn explanation_names_the_scope_mismatch() {
        let session = unit("Trésorier", "1");
        let explanation =
            explain_authorization(&session, Permission::ViewFinances, Some(&UnitId::new("9")));

        assert!(!explanation.granted);
        let denial = explanation.denial_reason.unwrap();
        assert_eq!(denial.kind, DenialKind::UnitScopeMismatch);
    }

    #[test]
    fn explanation_suggests_granting_positions() {
        let session = unit("Secrétaire", "4");
        let explanation = explain_authorization(&session, Permission::ApproveFinances, None);

        let denial = explanation.denial_reason.unwrap();
        assert_eq!(denial.kind, DenialKind::MissingPermission);
        assert!(denial.suggestions.iter().any(|s| s.contains("Trésorier du Conseil")));
    }

    #[test]
    fn explanation_for_missing_session() {
        let explanation = explain_authorization(&Session::anonymous(), Permission::ViewReports, None);
        assert!(explanation.principal.is_none());
        assert_eq!(explanation.denial_reason.unwrap().kind, DenialKind::NoSession);
    }

    #[test]
    fn registry_covers_every_permission() {
        let registry = RbacRegistry::build();
        assert_eq!(registry.roles.len(), Role::ALL.len());
        for permission in Permission::ALL {
            assert!(
                !registry.roles_granting(permission).is_empty(),
                "no position grants {permission}"
            );
        }
    }

    fn any_permission() -> impl Strategy<Value = Permission> {
        prop::sample::select(Permission::ALL.to_vec())
    }

    fn any_unit() -> impl Strategy<Value = Option<UnitId>> {
        prop::option::of("[a-z0-9-]{1,8}".prop_map(UnitId::new))
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Property: labels outside the table deny every permission, in every scope.
        #[test]
        fn unknown_roles_fail_closed(
            label in "[A-Za-z ]{0,24}",
            permission in any_permission(),
            unit_id in any_unit(),
            council_kind in any::<bool>(),
        ) {
            prop_assume!(Role::from_label(&label).is_none());
            let session = if council_kind {
                council(&label)
            } else {
                unit(&label, "1")
            };
            prop_assert!(!can(&session, permission, unit_id.as_ref()));
        }

        /// Property: a unit officer allowed in their own unit is denied in any other.
        #[test]
        fn unit_scope_never_leaks(
            role in prop::sample::select(Role::ALL.to_vec()),
            permission in any_permission(),
            other in "[a-z0-9-]{1,8}",
        ) {
            prop_assume!(other != "home");
            let session = unit(role.label(), "home");
            if can(&session, permission, Some(&UnitId::new("home"))) {
                prop_assert!(!can(&session, permission, Some(&UnitId::new(other))));
            }
        }

        /// Property: the explanation always agrees with the decision.
        #[test]
        fn explanation_agrees_with_can(
            role in prop::sample::select(Role::ALL.to_vec()),
            permission in any_permission(),
            unit_id in any_unit(),
        ) {
            let session = match role.scope() {
                RoleScope::Council => council(role.label()),
                RoleScope::Unit => unit(role.label(), "1"),
            };
            let explanation = explain_authorization(&session, permission, unit_id.as_ref());
            prop_assert_eq!(explanation.granted, can(&session, permission, unit_id.as_ref()));
        }
    }
}
