//! Subscription system for live document updates.
//!
//! Every write to the document produces one [`ChangeEvent`], offered to all
//! registered subscribers with a non-blocking send:
//! - Bounded per-subscriber buffers (16 events by default)
//! - A full buffer drops the event for that subscriber only
//! - Writers never wait on subscribers
//!
//! Delivery is advisory. A subscriber that falls behind re-reads the store.
//!
//! # Example
//!
//! ```ignore
//! let manager = SubscriptionManager::new();
//! let sub = manager.subscribe_scoped();
//!
//! while let Ok(event) = sub.recv() {
//!     println!("now at version {}", event.version);
//! }
//! // `sub` unregisters itself here.
//! ```

mod manager;
mod types;

pub use manager::{ScopedSubscription, SubscriptionManager};
pub use types::{
    BroadcastStats, ChangeEvent, SubscriptionHandle, SubscriptionId, DEFAULT_BUFFER_SIZE,
};
