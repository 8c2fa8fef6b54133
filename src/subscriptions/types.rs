//! Subscription types for snapshot change notifications.

use crate::types::Company;
use crossbeam_channel::Sender;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Callback invoked with the full snapshot.
pub type Observer = Arc<dyn Fn(&[Company]) + Send + Sync>;

/// A registered receiver of snapshots.
#[derive(Clone)]
pub(crate) enum Subscriber {
    Callback(Observer),
    Channel(Sender<SnapshotEvent>),
}

pub(crate) type SubscriberMap = RwLock<HashMap<SubscriptionId, Subscriber>>;

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Events delivered to channel subscribers.
#[derive(Clone, Debug)]
pub enum SnapshotEvent {
    /// The collection changed; `records` is the complete new snapshot.
    Changed {
        generation: u64,
        records: Arc<Vec<Company>>,
    },

    /// Subscription was dropped.
    Dropped { reason: DropReason },
}

/// Why a subscription was dropped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DropReason {
    /// Send buffer overflowed (slow consumer).
    BufferOverflow,
    /// Receiver was dropped.
    Disconnected,
    /// Explicitly unsubscribed.
    Unsubscribed,
}

/// Handle to a callback subscription.
///
/// Dropping the handle does not unsubscribe.
pub struct Subscription {
    pub(crate) id: SubscriptionId,
    pub(crate) subscribers: Weak<SubscriberMap>,
}

impl Subscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Stop receiving notifications. Safe to call more than once.
    ///
    /// Returns whether this call removed the subscription.
    pub fn unsubscribe(&self) -> bool {
        match self.subscribers.upgrade() {
            Some(subscribers) => subscribers.write().remove(&self.id).is_some(),
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        self.subscribers
            .upgrade()
            .map(|subscribers| subscribers.read().contains_key(&self.id))
            .unwrap_or(false)
    }
}

/// Handle to a channel subscription.
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<SnapshotEvent>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<SnapshotEvent, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<SnapshotEvent, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: std::time::Duration,
    ) -> Result<SnapshotEvent, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}
