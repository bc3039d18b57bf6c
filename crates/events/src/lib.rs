//! Change notifications for synchronized collections.
//!
//! Notifications carry no record payload, only "records of this kind changed".
//! Consumers react by re-fetching.

pub mod bus;
pub mod in_memory_bus;
pub mod notice;

pub use bus::{NotificationBus, Subscription};
pub use in_memory_bus::{InMemoryNotificationBus, NotificationError};
pub use notice::{ChangeNotice, ChangeOp};
