//! Subscription types for live document updates.

use crate::types::Version;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default number of undelivered events a subscriber may hold.
pub const DEFAULT_BUFFER_SIZE: usize = 16;

/// Emitted once per write to every subscriber registered at that moment.
///
/// Carries the full new content, never a diff. Consumers treat it as a hint
/// and can always re-read the store for the authoritative state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub content: Arc<str>,
    pub source: String,
    pub version: Version,
}

/// Unique identifier for a subscription.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Receiving end of a subscription.
///
/// Owned by the serving context, which must hand the id back to
/// `unsubscribe` before discarding it (see [`super::ScopedSubscription`]).
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    /// Channel to receive events.
    pub receiver: crossbeam_channel::Receiver<Arc<ChangeEvent>>,
}

impl SubscriptionHandle {
    /// Receive the next event (blocking).
    pub fn recv(&self) -> Result<Arc<ChangeEvent>, crossbeam_channel::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive an event (non-blocking).
    pub fn try_recv(&self) -> Result<Arc<ChangeEvent>, crossbeam_channel::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Receive with timeout.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<Arc<ChangeEvent>, crossbeam_channel::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Number of events waiting to be consumed.
    pub fn pending(&self) -> usize {
        self.receiver.len()
    }
}

/// What happened during one fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BroadcastStats {
    /// Subscribers that accepted the event.
    pub delivered: usize,
    /// Subscribers whose buffer was full; they miss this event.
    pub dropped: usize,
    /// Registry entries removed because their receiver no longer exists.
    pub pruned: usize,
}
