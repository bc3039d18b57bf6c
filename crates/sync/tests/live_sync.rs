use std::sync::Arc;
use std::time::Duration;

use curia_core::{EntityKind, RecordId};
use curia_events::InMemoryNotificationBus;
use curia_sync::{
    EntityStore, InMemoryEntityStore, Member, MemberDraft, MemberPatch, MembershipKind,
    Praesidium, PraesidiumDraft, SyncEntity, SyncedCollection, Zone, ZoneDraft,
};

type Store<E> = Arc<InMemoryEntityStore<E, InMemoryNotificationBus>>;

fn store<E: SyncEntity>(bus: &InMemoryNotificationBus) -> Store<E> {
    Arc::new(InMemoryEntityStore::new(bus.clone()))
}

fn member(praesidium_id: RecordId, name: &str) -> MemberDraft {
    MemberDraft {
        praesidium_id,
        full_name: name.to_string(),
        membership: MembershipKind::Active,
        phone: None,
        joined_on: None,
    }
}

/// Notices are delivered asynchronously; poll briefly until the view catches up.
async fn eventually<E: SyncEntity>(
    collection: &SyncedCollection<E>,
    mut ready: impl FnMut(&[E]) -> bool,
) {
    for _ in 0..50 {
        if collection.with_items(&mut ready) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("collection did not converge within timeout");
}

#[tokio::test]
async fn remote_change_reaches_every_collection_of_the_kind() {
    let bus = InMemoryNotificationBus::new();
    let zones = store::<Zone>(&bus);

    let left = SyncedCollection::<Zone>::activate(zones.clone(), &bus, None).await;
    let right = SyncedCollection::<Zone>::activate(zones.clone(), &bus, None).await;
    assert_eq!(bus.subscriber_count(EntityKind::Zone), 2);

    // Written by someone else entirely.
    let created = zones
        .insert(ZoneDraft {
            name: "Nord".to_string(),
        })
        .await
        .unwrap();

    eventually(&left, |items| items.iter().any(|z| z.id == created.id)).await;
    eventually(&right, |items| items.iter().any(|z| z.id == created.id)).await;
}

#[tokio::test]
async fn local_mutation_converges_other_collections() {
    let bus = InMemoryNotificationBus::new();
    let zones = store::<Zone>(&bus);

    let writer = SyncedCollection::<Zone>::activate(zones.clone(), &bus, None).await;
    let reader = SyncedCollection::<Zone>::activate(zones.clone(), &bus, None).await;

    let zone = writer
        .create(ZoneDraft {
            name: "Nord".to_string(),
        })
        .await
        .unwrap();
    eventually(&reader, |items| items.len() == 1).await;

    writer.delete(zone.id).await.unwrap();
    assert!(writer.items().is_empty());
    eventually(&reader, |items| items.is_empty()).await;
}

#[tokio::test]
async fn notices_of_other_kinds_are_ignored() {
    let bus = InMemoryNotificationBus::new();
    let zones = store::<Zone>(&bus);
    let praesidia = store::<Praesidium>(&bus);

    let zone = zones
        .insert(ZoneDraft {
            name: "Nord".to_string(),
        })
        .await
        .unwrap();
    let view = SyncedCollection::<Zone>::activate(zones.clone(), &bus, None).await;
    let mut changes = view.watch();

    praesidia
        .insert(PraesidiumDraft {
            zone_id: zone.id,
            name: "Notre-Dame".to_string(),
            parish: "Saint-Pierre".to_string(),
            meeting_day: None,
        })
        .await
        .unwrap();

    let refreshed = tokio::time::timeout(Duration::from_millis(100), changes.changed()).await;
    assert!(refreshed.is_err(), "zone view refetched on a praesidium notice");
}

#[tokio::test]
async fn filtered_collections_hold_independent_result_sets() {
    let bus = InMemoryNotificationBus::new();
    let members = store::<Member>(&bus);
    let (north, south) = (RecordId::new(), RecordId::new());

    let north_view = SyncedCollection::<Member>::activate(members.clone(), &bus, Some(north)).await;
    let south_view = SyncedCollection::<Member>::activate(members.clone(), &bus, Some(south)).await;
    let everyone = SyncedCollection::<Member>::activate(members.clone(), &bus, None).await;

    let anne = north_view.create(member(north, "Anne")).await.unwrap();
    members.insert(member(south, "Paul")).await.unwrap();

    eventually(&everyone, |items| items.len() == 2).await;
    eventually(&south_view, |items| items.len() == 1).await;
    eventually(&north_view, |items| items.len() == 1).await;
    assert_eq!(north_view.items()[0].id, anne.id);
    assert_eq!(south_view.items()[0].full_name, "Paul");
}

#[tokio::test]
async fn creating_outside_the_filter_does_not_pollute_the_view() {
    let bus = InMemoryNotificationBus::new();
    let members = store::<Member>(&bus);
    let (north, south) = (RecordId::new(), RecordId::new());

    let north_view = SyncedCollection::<Member>::activate(members.clone(), &bus, Some(north)).await;
    let stray = north_view.create(member(south, "Paul")).await.unwrap();

    assert!(north_view.get(stray.id).is_none());
    assert_eq!(members.len(), 1);
}

#[tokio::test]
async fn moving_a_record_out_of_the_filter_drops_it() {
    let bus = InMemoryNotificationBus::new();
    let members = store::<Member>(&bus);
    let (north, south) = (RecordId::new(), RecordId::new());

    let north_view = SyncedCollection::<Member>::activate(members.clone(), &bus, Some(north)).await;
    let anne = north_view.create(member(north, "Anne")).await.unwrap();

    let moved = north_view
        .update(
            anne.id,
            MemberPatch {
                praesidium_id: Some(south),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(moved.praesidium_id, south);
    assert!(north_view.get(anne.id).is_none());
}

#[tokio::test]
async fn deactivation_closes_the_subscription() {
    let bus = InMemoryNotificationBus::new();
    let zones = store::<Zone>(&bus);

    let view = SyncedCollection::<Zone>::activate(zones.clone(), &bus, None).await;
    let watcher = view.watch();
    assert_eq!(bus.subscriber_count(EntityKind::Zone), 1);

    view.deactivate().await;
    assert_eq!(bus.subscriber_count(EntityKind::Zone), 0);

    zones
        .insert(ZoneDraft {
            name: "Nord".to_string(),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(watcher.borrow().items.is_empty());
}

#[tokio::test]
async fn dropping_a_collection_detaches_it() {
    let bus = InMemoryNotificationBus::new();
    let zones = store::<Zone>(&bus);

    let view = SyncedCollection::<Zone>::activate(zones.clone(), &bus, None).await;
    drop(view);

    for _ in 0..50 {
        if bus.subscriber_count(EntityKind::Zone) == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("subscription outlived its collection");
}

#[tokio::test]
async fn unreachable_store_keeps_last_known_good_items() {
    let bus = InMemoryNotificationBus::new();
    let zones = store::<Zone>(&bus);
    zones
        .insert(ZoneDraft {
            name: "Nord".to_string(),
        })
        .await
        .unwrap();

    let view = SyncedCollection::<Zone>::activate(zones.clone(), &bus, None).await;
    assert_eq!(view.items().len(), 1);

    zones.set_available(false);
    view.refetch().await;

    assert_eq!(view.items().len(), 1);
    assert!(view.error().is_some());
    assert!(!view.is_loading());
}

#[tokio::test]
async fn slow_store_reports_loading_while_fetching() {
    let bus = InMemoryNotificationBus::new();
    let zones = Arc::new(
        InMemoryEntityStore::<Zone, _>::new(bus.clone()).with_latency(Duration::from_millis(50)),
    );
    let view = SyncedCollection::<Zone>::activate(zones.clone(), &bus, None).await;
    let mut changes = view.watch();

    let refetch = view.refetch();
    tokio::pin!(refetch);
    tokio::select! {
        _ = &mut refetch => panic!("refetch finished before its latency elapsed"),
        _ = changes.wait_for(|state| state.is_loading) => {}
    }
    refetch.await;
    assert!(!view.is_loading());
}

#[tokio::test]
async fn slow_refetch_overlapping_a_create_converges() {
    let bus = InMemoryNotificationBus::new();
    let zones = Arc::new(
        InMemoryEntityStore::<Zone, _>::new(bus.clone()).with_latency(Duration::from_millis(40)),
    );
    let view = SyncedCollection::<Zone>::activate(zones.clone(), &bus, None).await;

    // The refetch is issued before the insert and may read, or land, on either side of it.
    let (_, created) = tokio::join!(
        view.refetch(),
        view.create(ZoneDraft {
            name: "Nord".to_string(),
        })
    );
    let created = created.unwrap();

    eventually(&view, |items| items.len() == 1 && items[0].id == created.id).await;
    for _ in 0..50 {
        if !view.is_loading() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(!view.is_loading());
    assert_eq!(view.items().len(), 1);
}
