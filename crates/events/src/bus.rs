//! Notification channel abstraction (mechanics only).
//!
//! A bus fans change notices out to every subscriber of the notice's entity
//! kind. Delivery is best-effort and at-least-once: a subscriber may see the
//! same change reported more than once and must be idempotent (re-fetching is).
//!
//! A [`Subscription`] is a scoped resource. Dropping it (or calling
//! [`Subscription::close`]) detaches it from the bus, so a channel never
//! outlives its consumer.

use std::sync::Arc;

use tokio::sync::mpsc;

use curia_core::EntityKind;

use crate::notice::ChangeNotice;

type Unsubscribe = Box<dyn FnOnce() + Send + Sync>;

/// A standing subscription to change notices of one entity kind.
pub struct Subscription {
    kind: EntityKind,
    receiver: mpsc::UnboundedReceiver<ChangeNotice>,
    unsubscribe: Option<Unsubscribe>,
}

impl Subscription {
    /// Build a subscription from a receiver and a detach hook.
    ///
    /// `unsubscribe` runs exactly once, on `close()` or drop.
    pub fn new(
        kind: EntityKind,
        receiver: mpsc::UnboundedReceiver<ChangeNotice>,
        unsubscribe: impl FnOnce() + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            receiver,
            unsubscribe: Some(Box::new(unsubscribe)),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Wait for the next notice. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<ChangeNotice> {
        self.receiver.recv().await
    }

    /// Take a notice if one is already queued.
    pub fn try_recv(&mut self) -> Option<ChangeNotice> {
        self.receiver.try_recv().ok()
    }

    /// Discard queued notices, returning how many were dropped.
    ///
    /// Used to collapse a burst of notices into a single re-fetch.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        while self.receiver.try_recv().is_ok() {
            drained += 1;
        }
        drained
    }

    /// Detach from the bus now.
    pub fn close(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        self.receiver.close();
        if let Some(unsubscribe) = self.unsubscribe.take() {
            unsubscribe();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}

impl core::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Subscription")
            .field("kind", &self.kind)
            .field("attached", &self.unsubscribe.is_some())
            .finish()
    }
}

/// Per-kind publish/subscribe channel for change notices.
///
/// Implementations must be safe to share across tasks; the remote store
/// publishes while collection listeners subscribe.
pub trait NotificationBus: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, notice: ChangeNotice) -> Result<(), Self::Error>;

    fn subscribe(&self, kind: EntityKind) -> Subscription;
}

impl<B> NotificationBus for Arc<B>
where
    B: NotificationBus + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, notice: ChangeNotice) -> Result<(), Self::Error> {
        (**self).publish(notice)
    }

    fn subscribe(&self, kind: EntityKind) -> Subscription {
        (**self).subscribe(kind)
    }
}
