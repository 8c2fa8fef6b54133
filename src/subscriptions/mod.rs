//! Change notification for snapshot updates.
//!
//! Two kinds of subscriber are supported:
//! - Callbacks, invoked synchronously with the full record list
//! - Bounded channels, fed [`SnapshotEvent`]s; slow ones are dropped
//!
//! # Example
//!
//! ```ignore
//! let notifier = ChangeNotifier::new();
//!
//! let sub = notifier.subscribe(|records| println!("{} companies", records.len()));
//! let handle = notifier.subscribe_channel(16);
//!
//! // later
//! sub.unsubscribe();
//! notifier.unsubscribe(handle.id);
//! ```

mod manager;
mod types;

pub use manager::ChangeNotifier;
pub use types::{
    DropReason, Observer, SnapshotEvent, Subscription, SubscriptionHandle, SubscriptionId,
};
