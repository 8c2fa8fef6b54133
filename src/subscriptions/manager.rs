//! Change notifier broadcasting snapshots to subscribers.

use crate::query::Snapshot;
use crate::types::Company;
use crossbeam_channel::{bounded, TrySendError};
use parking_lot::{ReentrantMutex, RwLock};
use std::any::Any;
use std::cell::Cell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::types::{
    DropReason, SnapshotEvent, Subscriber, SubscriberMap, Subscription, SubscriptionHandle,
    SubscriptionId,
};

/// Observer list told about every new snapshot.
///
/// Deliveries are serialized: one snapshot reaches every subscriber before
/// the next starts. The delivery lock is re-entrant and the subscriber map
/// is not held during callbacks, so a callback may subscribe, unsubscribe,
/// query the registry or trigger another notification.
pub struct ChangeNotifier {
    /// Active subscriptions by ID.
    subscribers: Arc<SubscriberMap>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Highest snapshot generation handed out so far.
    last_delivered: ReentrantMutex<Cell<u64>>,
}

impl ChangeNotifier {
    /// Create a new notifier.
    pub fn new() -> Self {
        Self {
            subscribers: Arc::new(RwLock::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            last_delivered: ReentrantMutex::new(Cell::new(0)),
        }
    }

    /// Register a callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&[Company]) + Send + Sync + 'static,
    {
        let id = self.register(Subscriber::Callback(Arc::new(callback)));

        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Register a bounded channel. A subscriber that lets `buffer_size`
    /// events pile up is dropped.
    pub fn subscribe_channel(&self, buffer_size: usize) -> SubscriptionHandle {
        let (sender, receiver) = bounded(buffer_size.max(1));
        let id = self.register(Subscriber::Channel(sender));

        SubscriptionHandle { id, receiver }
    }

    /// Unsubscribe and clean up. Returns whether the subscription existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.write().remove(&id);
        match removed {
            Some(Subscriber::Channel(sender)) => {
                // Best effort
                let _ = sender.try_send(SnapshotEvent::Dropped {
                    reason: DropReason::Unsubscribed,
                });
                true
            }
            Some(Subscriber::Callback(_)) => true,
            None => false,
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Deliver `snapshot` to every subscriber.
    ///
    /// A panicking callback is logged and skipped; the rest still receive the
    /// snapshot. Snapshots older than one already delivered are discarded.
    pub fn notify(&self, snapshot: &Snapshot) {
        let generation = snapshot.generation();
        let last_delivered = self.last_delivered.lock();

        let previous = last_delivered.get();
        if previous > generation {
            debug!(generation, previous, "Skipping stale snapshot");
            return;
        }
        last_delivered.set(generation);

        let targets: Vec<(SubscriptionId, Subscriber)> = self
            .subscribers
            .read()
            .iter()
            .map(|(id, sub)| (*id, sub.clone()))
            .collect();

        let records = snapshot.shared();
        let mut to_remove = Vec::new();

        for (id, target) in targets {
            // A callback on this thread already delivered something newer
            if last_delivered.get() > generation {
                debug!(generation, "Newer snapshot delivered during notify");
                break;
            }

            match target {
                Subscriber::Callback(callback) => {
                    let outcome =
                        panic::catch_unwind(AssertUnwindSafe(|| callback(records.as_slice())));
                    if let Err(payload) = outcome {
                        error!(
                            subscription_id = id.0,
                            panic = %panic_message(payload.as_ref()),
                            "Observer panicked while handling snapshot"
                        );
                    }
                }
                Subscriber::Channel(sender) => {
                    let event = SnapshotEvent::Changed {
                        generation,
                        records: Arc::clone(&records),
                    };
                    match sender.try_send(event) {
                        Ok(()) => {}
                        Err(TrySendError::Full(_)) => {
                            to_remove.push((id, DropReason::BufferOverflow))
                        }
                        Err(TrySendError::Disconnected(_)) => {
                            to_remove.push((id, DropReason::Disconnected))
                        }
                    }
                }
            }
        }

        // Remove dropped subscriptions
        if !to_remove.is_empty() {
            let mut subs = self.subscribers.write();
            for (id, reason) in to_remove {
                if let Some(Subscriber::Channel(sender)) = subs.remove(&id) {
                    warn!(subscription_id = id.0, ?reason, "Dropping channel subscriber");
                    // Try to notify about the drop (might fail, that's ok)
                    let _ = sender.try_send(SnapshotEvent::Dropped { reason });
                }
            }
        }
    }

    fn register(&self, subscriber: Subscriber) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.subscribers.write().insert(id, subscriber);
        id
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
