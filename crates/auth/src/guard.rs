//! Screen-level access decisions built on the evaluator.

use curia_core::UnitId;

use crate::authorize::can;
use crate::permissions::Permission;
use crate::session::Session;

/// What a guarded screen should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The session is still being resolved; show a loading indicator.
    Loading,
    Render,
    RedirectToLogin,
    /// Signed in, but not allowed. Rendered in place, no redirect.
    AccessDenied,
    /// Public-only screen visited while signed in.
    RedirectHome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RequiredAccess {
    SignedIn,
    Permission(Permission),
    AnyOf(Vec<Permission>),
}

/// Guard for screens that require a session and optionally a permission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteGuard {
    required: RequiredAccess,
    unit_id: Option<UnitId>,
}

impl RouteGuard {
    /// Any signed-in identity may enter.
    pub fn signed_in() -> Self {
        Self {
            required: RequiredAccess::SignedIn,
            unit_id: None,
        }
    }

    pub fn requires(permission: Permission) -> Self {
        Self {
            required: RequiredAccess::Permission(permission),
            unit_id: None,
        }
    }

    /// Enter when any one of `permissions` is granted (e.g. combined approval screens).
    pub fn any_of(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self {
            required: RequiredAccess::AnyOf(permissions.into_iter().collect()),
            unit_id: None,
        }
    }

    /// Evaluate the permission within `unit_id`.
    pub fn scoped_to(mut self, unit_id: UnitId) -> Self {
        self.unit_id = Some(unit_id);
        self
    }

    pub fn evaluate(&self, session: &Session) -> GuardOutcome {
        if session.is_loading() {
            return GuardOutcome::Loading;
        }
        if !session.is_authenticated() {
            return GuardOutcome::RedirectToLogin;
        }

        let unit_id = self.unit_id.as_ref();
        let allowed = match &self.required {
            RequiredAccess::SignedIn => true,
            RequiredAccess::Permission(permission) => can(session, *permission, unit_id),
            RequiredAccess::AnyOf(permissions) => can_any(session, permissions, unit_id),
        };

        if allowed {
            GuardOutcome::Render
        } else {
            GuardOutcome::AccessDenied
        }
    }
}

/// Guard for screens only meaningful when signed out (the login screen).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicOnlyGuard;

impl PublicOnlyGuard {
    pub fn evaluate(&self, session: &Session) -> GuardOutcome {
        if session.is_loading() {
            GuardOutcome::Loading
        } else if session.is_authenticated() {
            GuardOutcome::RedirectHome
        } else {
            GuardOutcome::Render
        }
    }
}

/// OR of single-permission checks. An empty list allows nothing.
pub fn can_any(session: &Session, permissions: &[Permission], unit_id: Option<&UnitId>) -> bool {
    permissions
        .iter()
        .any(|permission| can(session, *permission, unit_id))
}
