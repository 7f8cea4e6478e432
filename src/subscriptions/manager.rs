//! Subscription registry and fan-out of change events.

use crossbeam_channel::{bounded, Sender, TrySendError};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

use super::types::{
    BroadcastStats, ChangeEvent, SubscriptionHandle, SubscriptionId, DEFAULT_BUFFER_SIZE,
};

/// Manages subscriptions and broadcasts events.
///
/// The registry has its own lock, independent of whatever guards the
/// document, so a large registry never slows readers or writers of content.
pub struct SubscriptionManager {
    /// Active subscriptions by ID.
    subscribers: Mutex<HashMap<SubscriptionId, Sender<Arc<ChangeEvent>>>>,
    /// Counter for generating subscription IDs.
    next_id: AtomicU64,
    /// Channel capacity for new subscriptions.
    buffer_size: usize,
}

impl SubscriptionManager {
    /// Create a new subscription manager.
    pub fn new() -> Self {
        Self::with_buffer_size(DEFAULT_BUFFER_SIZE)
    }

    /// Create a new subscription manager with a custom per-subscriber buffer.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Capacity of each subscription channel.
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Create a new subscription.
    pub fn subscribe(&self) -> SubscriptionHandle {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (sender, receiver) = bounded(self.buffer_size);

        let total = {
            let mut subs = self.subscribers.lock();
            subs.insert(id, sender);
            subs.len()
        };
        debug!(subscription = id.0, total, "subscribed");

        SubscriptionHandle { id, receiver }
    }

    /// Create a subscription that unsubscribes itself when dropped.
    pub fn subscribe_scoped(&self) -> ScopedSubscription<'_> {
        ScopedSubscription {
            manager: self,
            handle: self.subscribe(),
        }
    }

    /// Remove a subscription. Unknown or already removed ids are ignored.
    ///
    /// Once this returns, no broadcast will touch the subscription again.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let removed = self.subscribers.lock().remove(&id).is_some();
        if removed {
            debug!(subscription = id.0, "unsubscribed");
        }
    }

    /// Get subscription count.
    pub fn subscription_count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Offer `event` to every registered subscriber without blocking.
    ///
    /// A full buffer means that subscriber misses this event. Entries whose
    /// receiver is gone are removed.
    pub fn broadcast(&self, event: ChangeEvent) -> BroadcastStats {
        let event = Arc::new(event);
        let mut stats = BroadcastStats::default();

        let mut subs = self.subscribers.lock();
        subs.retain(|id, sender| match sender.try_send(Arc::clone(&event)) {
            Ok(()) => {
                stats.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                trace!(subscription = id.0, version = event.version.0, "buffer full, event dropped");
                stats.dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!(subscription = id.0, "receiver gone, pruning");
                stats.pruned += 1;
                false
            }
        });

        stats
    }
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// A subscription tied to a scope.
///
/// Dropping it unregisters the channel, whichever way the scope is left.
pub struct ScopedSubscription<'a> {
    manager: &'a SubscriptionManager,
    handle: SubscriptionHandle,
}

impl ScopedSubscription<'_> {
    pub fn id(&self) -> SubscriptionId {
        self.handle.id
    }
}

impl Deref for ScopedSubscription<'_> {
    type Target = SubscriptionHandle;

    fn deref(&self) -> &SubscriptionHandle {
        &self.handle
    }
}

impl Drop for ScopedSubscription<'_> {
    fn drop(&mut self) {
        self.manager.unsubscribe(self.handle.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Version;
    use std::time::Duration;

    fn make_event(content: &str, version: u64) -> ChangeEvent {
        ChangeEvent {
            content: Arc::from(content),
            source: "test".to_string(),
            version: Version(version),
        }
    }

    #[test]
    fn test_subscribe_unsubscribe() {
        let manager = SubscriptionManager::new();

        let handle = manager.subscribe();
        assert_eq!(manager.subscription_count(), 1);

        manager.unsubscribe(handle.id);
        assert_eq!(manager.subscription_count(), 0);
    }

    #[test]
    fn test_unsubscribe_is_idempotent() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe();

        manager.unsubscribe(handle.id);
        manager.unsubscribe(handle.id);
        manager.unsubscribe(SubscriptionId(9999));

        assert_eq!(manager.subscription_count(), 0);
    }

    #[test]
    fn test_broadcast_reaches_every_subscriber() {
        let manager = SubscriptionManager::new();
        let a = manager.subscribe();
        let b = manager.subscribe();

        let stats = manager.broadcast(make_event("hello", 2));
        assert_eq!(stats.delivered, 2);

        for handle in [&a, &b] {
            let event = handle.recv_timeout(Duration::from_millis(100)).unwrap();
            assert_eq!(&*event.content, "hello");
            assert_eq!(event.version, Version(2));
        }
    }

    #[test]
    fn test_full_buffer_drops_event_but_keeps_subscriber() {
        let manager = SubscriptionManager::with_buffer_size(2);
        let handle = manager.subscribe();

        for i in 0..5 {
            manager.broadcast(make_event("x", i + 2));
        }

        // Still registered, just lossy.
        assert_eq!(manager.subscription_count(), 1);
        assert_eq!(handle.pending(), 2);

        // The oldest events are the ones kept.
        assert_eq!(handle.try_recv().unwrap().version, Version(2));
        assert_eq!(handle.try_recv().unwrap().version, Version(3));
        assert!(handle.try_recv().is_err());

        // Room again: the next event goes through.
        let stats = manager.broadcast(make_event("y", 7));
        assert_eq!(stats.delivered, 1);
        assert_eq!(handle.try_recv().unwrap().version, Version(7));
    }

    #[test]
    fn test_no_delivery_after_unsubscribe() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe();
        manager.unsubscribe(handle.id);

        let stats = manager.broadcast(make_event("late", 2));
        assert_eq!(stats, BroadcastStats::default());
        assert!(handle.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_dropped_receiver_is_pruned() {
        let manager = SubscriptionManager::new();
        let handle = manager.subscribe();
        drop(handle);

        let stats = manager.broadcast(make_event("x", 2));
        assert_eq!(stats.pruned, 1);
        assert_eq!(manager.subscription_count(), 0);
    }

    #[test]
    fn test_scoped_subscription_unsubscribes_on_drop() {
        let manager = SubscriptionManager::new();
        {
            let scoped = manager.subscribe_scoped();
            assert_eq!(manager.subscription_count(), 1);
            manager.broadcast(make_event("inside", 2));
            assert_eq!(&*scoped.recv().unwrap().content, "inside");
        }
        assert_eq!(manager.subscription_count(), 0);
    }

    #[test]
    fn test_zero_buffer_is_clamped() {
        let manager = SubscriptionManager::with_buffer_size(0);
        assert_eq!(manager.buffer_size(), 1);
    }
}
