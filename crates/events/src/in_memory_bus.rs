//! In-memory notification bus for tests/dev.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use thiserror::Error;
use tokio::sync::mpsc;

use curia_core::EntityKind;

use crate::bus::{NotificationBus, Subscription};
use crate::notice::ChangeNotice;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NotificationError {
    /// Publish failed due to internal lock poisoning.
    #[error("notification bus lock poisoned")]
    Poisoned,
}

#[derive(Debug, Default)]
struct Registry {
    next_id: AtomicU64,
    subscribers: Mutex<HashMap<u64, (EntityKind, mpsc::UnboundedSender<ChangeNotice>)>>,
}

/// In-memory pub/sub bus.
///
/// - No IO
/// - Fan-out per entity kind
/// - Subscribers are removed when their [`Subscription`] drops
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotificationBus {
    registry: Arc<Registry>,
}

impl InMemoryNotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscriptions for `kind`.
    pub fn subscriber_count(&self, kind: EntityKind) -> usize {
        match self.registry.subscribers.lock() {
            Ok(subs) => subs.values().filter(|(k, _)| *k == kind).count(),
            Err(_) => 0,
        }
    }
}

impl NotificationBus for InMemoryNotificationBus {
    type Error = NotificationError;

    fn publish(&self, notice: ChangeNotice) -> Result<(), Self::Error> {
        let mut subs = self
            .registry
            .subscribers
            .lock()
            .map_err(|_| NotificationError::Poisoned)?;

        // Drop any dead subscribers while publishing.
        subs.retain(|_, (kind, tx)| *kind != notice.kind || tx.send(notice).is_ok());

        tracing::debug!(kind = %notice.kind, op = ?notice.op, "change notice published");
        Ok(())
    }

    fn subscribe(&self, kind: EntityKind) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);

        // If the lock is poisoned we still return a subscription;
        // it just never receives notices.
        if let Ok(mut subs) = self.registry.subscribers.lock() {
            subs.insert(id, (kind, tx));
        }

        let registry: Weak<Registry> = Arc::downgrade(&self.registry);
        Subscription::new(kind, rx, move || {
            if let Some(registry) = registry.upgrade() {
                if let Ok(mut subs) = registry.subscribers.lock() {
                    subs.remove(&id);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::ChangeOp;

    #[tokio::test]
    async fn notices_reach_only_subscribers_of_that_kind() {
        let bus = InMemoryNotificationBus::new();
        let mut members = bus.subscribe(EntityKind::Member);
        let mut zones = bus.subscribe(EntityKind::Zone);

        bus.publish(ChangeNotice::new(EntityKind::Member, ChangeOp::Insert))
            .unwrap();

        let notice = members.recv().await.unwrap();
        assert_eq!(notice.kind, EntityKind::Member);
        assert!(zones.try_recv().is_none());
    }

    #[test]
    fn dropping_a_subscription_unsubscribes() {
        let bus = InMemoryNotificationBus::new();
        let first = bus.subscribe(EntityKind::Officer);
        let second = bus.subscribe(EntityKind::Officer);
        assert_eq!(bus.subscriber_count(EntityKind::Officer), 2);

        drop(first);
        assert_eq!(bus.subscriber_count(EntityKind::Officer), 1);

        second.close();
        assert_eq!(bus.subscriber_count(EntityKind::Officer), 0);
    }

    #[test]
    fn drain_collapses_a_burst() {
        let bus = InMemoryNotificationBus::new();
        let mut sub = bus.subscribe(EntityKind::Praesidium);
        for op in [ChangeOp::Insert, ChangeOp::Update, ChangeOp::Delete] {
            bus.publish(ChangeNotice::new(EntityKind::Praesidium, op)).unwrap();
        }

        assert!(sub.try_recv().is_some());
        assert_eq!(sub.drain(), 2);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn publishing_without_subscribers_is_fine() {
        let bus = InMemoryNotificationBus::new();
        assert!(bus
            .publish(ChangeNotice::new(EntityKind::Zone, ChangeOp::Update))
            .is_ok());
    }
}
