//! Signed-in workspace: opens synchronized collections on behalf of the
//! current session. Reads are checked when a collection is opened; every write
//! through the returned handle is checked against the session at call time.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::watch;

use curia_auth::{AccountKind, IdentityDirectory, KeyValueStorage, Permission, SessionStore};
use curia_core::{EntityKind, RecordId, UnitId};
use curia_events::NotificationBus;
use curia_sync::{CollectionState, EntityStore, StoreError, SyncEntity, SyncedCollection};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum OpenError {
    #[error("sign in to view {kind} records")]
    NotSignedIn { kind: EntityKind },

    #[error("access denied: viewing {kind} records requires `{permission}`{}", unit_suffix(.unit))]
    AccessDenied {
        kind: EntityKind,
        permission: Permission,
        unit: Option<UnitId>,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WriteError {
    #[error("sign in to change {kind} records")]
    NotSignedIn { kind: EntityKind },

    #[error("access denied: changing {kind} records requires `{permission}`{}", unit_suffix(.unit))]
    AccessDenied {
        kind: EntityKind,
        permission: Permission,
        unit: Option<UnitId>,
    },

    #[error("{kind} {id} is not part of this view")]
    NotInView { kind: EntityKind, id: RecordId },

    #[error(transparent)]
    Store(#[from] StoreError),
}

fn unit_suffix(unit: &Option<UnitId>) -> String {
    match unit {
        Some(unit) => format!(" in unit {unit}"),
        None => String::new(),
    }
}

/// Permission needed to read a kind's records.
pub fn view_permission(kind: EntityKind) -> Permission {
    match kind {
        EntityKind::Zone => Permission::ViewAllUnits,
        EntityKind::Praesidium => Permission::ViewAllPraesidia,
        EntityKind::Member => Permission::ViewMembers,
        EntityKind::Officer => Permission::ViewOfficers,
    }
}

/// Permission needed to create, change or delete a kind's records.
///
/// Zones have no dedicated token; they are part of the council structure
/// managed alongside praesidia.
pub fn manage_permission(kind: EntityKind) -> Permission {
    match kind {
        EntityKind::Zone | EntityKind::Praesidium => Permission::ManagePraesidia,
        EntityKind::Member => Permission::ManageMembers,
        EntityKind::Officer => Permission::ManageOfficers,
    }
}

fn is_unit_scoped(kind: EntityKind) -> bool {
    matches!(kind, EntityKind::Member | EntityKind::Officer)
}

/// Unit a read is confined to. Members and officers are filtered by their
/// praesidium, which is the unit.
fn view_unit(kind: EntityKind, parent: Option<RecordId>) -> Option<UnitId> {
    if is_unit_scoped(kind) {
        parent.map(UnitId::from)
    } else {
        None
    }
}

/// Unit a write lands in: the parent praesidium for members and officers, the
/// praesidium itself when one is changed.
fn write_unit(kind: EntityKind, parent: Option<RecordId>, id: Option<RecordId>) -> Option<UnitId> {
    match kind {
        EntityKind::Member | EntityKind::Officer => parent.map(UnitId::from),
        EntityKind::Praesidium => id.map(UnitId::from),
        EntityKind::Zone => None,
    }
}

/// Outcome of one access check, before it is shaped into a read or write error.
enum Refusal {
    NotSignedIn,
    Denied {
        permission: Permission,
        unit: Option<UnitId>,
    },
}

fn check_access<D, S>(
    session: &SessionStore<D, S>,
    kind: EntityKind,
    permission: Permission,
    unit: Option<UnitId>,
) -> Result<(), Refusal>
where
    D: IdentityDirectory,
    S: KeyValueStorage,
{
    let session = session.session();
    let Some(identity) = session.identity() else {
        return Err(Refusal::NotSignedIn);
    };

    // Without a unit, a member/officer operation spans every unit.
    let spans_units = is_unit_scoped(kind) && unit.is_none();
    if spans_units && identity.account_kind == AccountKind::UnitOfficer {
        return Err(Refusal::Denied { permission, unit });
    }

    if curia_auth::can(&session, permission, unit.as_ref()) {
        Ok(())
    } else {
        Err(Refusal::Denied { permission, unit })
    }
}

fn authorize_write<D, S>(session: &SessionStore<D, S>, kind: EntityKind, unit: Option<UnitId>) -> Result<(), WriteError>
where
    D: IdentityDirectory,
    S: KeyValueStorage,
{
    check_access(session, kind, manage_permission(kind), unit).map_err(|refusal| {
        let err = match refusal {
            Refusal::NotSignedIn => WriteError::NotSignedIn { kind },
            Refusal::Denied { permission, unit } => WriteError::AccessDenied { kind, permission, unit },
        };
        tracing::info!(%kind, error = %err, "write refused");
        err
    })
}

pub struct Workspace<D, S, B> {
    session: Arc<SessionStore<D, S>>,
    bus: B,
}

impl<D, S, B> Workspace<D, S, B>
where
    D: IdentityDirectory,
    S: KeyValueStorage,
    B: NotificationBus,
{
    pub fn new(session: Arc<SessionStore<D, S>>, bus: B) -> Self {
        Self { session, bus }
    }

    pub fn session(&self) -> &SessionStore<D, S> {
        &self.session
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// Check read access to `E` records under `parent` for the current session.
    pub fn check_view<E: SyncEntity>(&self, parent: Option<RecordId>) -> Result<(), OpenError> {
        let kind = E::KIND;
        check_access(&self.session, kind, view_permission(kind), view_unit(kind, parent)).map_err(
            |refusal| match refusal {
                Refusal::NotSignedIn => OpenError::NotSignedIn { kind },
                Refusal::Denied { permission, unit } => OpenError::AccessDenied { kind, permission, unit },
            },
        )
    }

    /// Open a live collection of `E` records, filtered by `parent`.
    pub async fn open<E, St>(
        &self,
        store: St,
        parent: Option<RecordId>,
    ) -> Result<ScopedCollection<E, D, S>, OpenError>
    where
        E: SyncEntity,
        St: EntityStore<E> + 'static,
    {
        if let Err(err) = self.check_view::<E>(parent) {
            tracing::info!(kind = %E::KIND, ?parent, error = %err, "collection access refused");
            return Err(err);
        }

        Ok(ScopedCollection {
            collection: SyncedCollection::activate(store, &self.bus, parent).await,
            session: self.session.clone(),
        })
    }
}

/// A synchronized collection opened through a [`Workspace`].
///
/// Reads pass straight through. Writes need the kind's manage permission in
/// the unit they touch, and updates/deletes only reach records held in this
/// view.
pub struct ScopedCollection<E: SyncEntity, D, S> {
    collection: SyncedCollection<E>,
    session: Arc<SessionStore<D, S>>,
}

impl<E, D, S> ScopedCollection<E, D, S>
where
    E: SyncEntity,
    D: IdentityDirectory,
    S: KeyValueStorage,
{
    pub fn filter(&self) -> Option<RecordId> {
        self.collection.filter()
    }

    pub fn items(&self) -> Vec<E> {
        self.collection.items()
    }

    pub fn with_items<R>(&self, f: impl FnOnce(&[E]) -> R) -> R {
        self.collection.with_items(f)
    }

    pub fn get(&self, id: RecordId) -> Option<E> {
        self.collection.get(id)
    }

    pub fn is_loading(&self) -> bool {
        self.collection.is_loading()
    }

    pub fn error(&self) -> Option<String> {
        self.collection.error()
    }

    pub fn snapshot(&self) -> CollectionState<E> {
        self.collection.snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<CollectionState<E>> {
        self.collection.watch()
    }

    pub async fn refetch(&self) {
        self.collection.refetch().await;
    }

    pub fn is_active(&self) -> bool {
        self.collection.is_active()
    }

    pub async fn deactivate(self) {
        self.collection.deactivate().await;
    }

    /// Whether the current session may write into `E`'s unit under `parent`.
    pub fn can_write_under(&self, parent: Option<RecordId>) -> bool {
        let unit = write_unit(E::KIND, parent, None);
        check_access(&self.session, E::KIND, manage_permission(E::KIND), unit).is_ok()
    }

    pub async fn create(&self, draft: E::Draft) -> Result<E, WriteError> {
        let unit = write_unit(E::KIND, E::draft_parent(&draft), None);
        authorize_write(&self.session, E::KIND, unit)?;
        Ok(self.collection.create(draft).await?)
    }

    pub async fn update(&self, id: RecordId, patch: E::Patch) -> Result<E, WriteError> {
        let current = self.held(id)?;
        authorize_write(&self.session, E::KIND, write_unit(E::KIND, current.parent_id(), Some(id)))?;

        // Moving a record needs write access at the destination as well.
        if let Some(destination) = E::patch_parent(&patch) {
            if current.parent_id() != Some(destination) {
                authorize_write(&self.session, E::KIND, write_unit(E::KIND, Some(destination), Some(id)))?;
            }
        }

        Ok(self.collection.update(id, patch).await?)
    }

    pub async fn delete(&self, id: RecordId) -> Result<(), WriteError> {
        let current = self.held(id)?;
        authorize_write(&self.session, E::KIND, write_unit(E::KIND, current.parent_id(), Some(id)))?;
        Ok(self.collection.delete(id).await?)
    }

    fn held(&self, id: RecordId) -> Result<E, WriteError> {
        self.collection
            .get(id)
            .ok_or(WriteError::NotInView { kind: E::KIND, id })
    }
}

impl<E: SyncEntity, D, S> core::fmt::Debug for ScopedCollection<E, D, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScopedCollection")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_kind_has_a_view_and_a_manage_permission() {
        for kind in EntityKind::ALL {
            assert!(view_permission(kind).as_str().starts_with("view_"));
            assert!(manage_permission(kind).as_str().starts_with("manage_"));
        }
    }

    #[test]
    fn only_member_and_officer_reads_are_unit_scoped() {
        let parent = RecordId::new();
        assert_eq!(view_unit(EntityKind::Member, Some(parent)), Some(UnitId::from(parent)));
        assert_eq!(view_unit(EntityKind::Officer, Some(parent)), Some(UnitId::from(parent)));
        assert_eq!(view_unit(EntityKind::Praesidium, Some(parent)), None);
        assert_eq!(view_unit(EntityKind::Zone, None), None);
    }

    #[test]
    fn praesidium_writes_land_in_the_praesidium_itself() {
        let (zone, praesidium) = (RecordId::new(), RecordId::new());
        assert_eq!(
            write_unit(EntityKind::Praesidium, Some(zone), Some(praesidium)),
            Some(UnitId::from(praesidium))
        );
        assert_eq!(write_unit(EntityKind::Praesidium, Some(zone), None), None);
        assert_eq!(write_unit(EntityKind::Member, Some(zone), None), Some(UnitId::from(zone)));
    }

    #[test]
    fn denial_message_names_the_unit() {
        let err = OpenError::AccessDenied {
            kind: EntityKind::Member,
            permission: Permission::ViewMembers,
            unit: Some(UnitId::new("u-1")),
        };
        assert!(err.to_string().contains("in unit u-1"));

        let err = WriteError::AccessDenied {
            kind: EntityKind::Member,
            permission: Permission::ManageMembers,
            unit: None,
        };
        assert!(err.to_string().contains("manage_members"));
    }
}
