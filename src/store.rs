//! The versioned shared document.

use crate::subscriptions::{
    BroadcastStats, ChangeEvent, ScopedSubscription, SubscriptionHandle, SubscriptionId,
    SubscriptionManager, DEFAULT_BUFFER_SIZE,
};
use crate::types::{Snapshot, Version};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info};

/// Store configuration.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Document text at version 1.
    pub initial_content: String,

    /// Undelivered events each subscriber may hold before new ones are
    /// dropped for it.
    pub subscriber_buffer: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_content: String::new(),
            subscriber_buffer: DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Content and version, always replaced together.
struct DocumentState {
    content: Arc<str>,
    version: Version,
}

/// The single shared document plus its subscriber registry.
///
/// Constructed once at startup and handed to every handler behind an `Arc`.
/// Reads take the content lock shared, writes take it exclusive, and the
/// registry has a lock of its own so fan-out never holds up content access.
pub struct DocumentStore {
    /// Current content and version.
    state: RwLock<DocumentState>,

    /// Subscribers waiting for change events.
    subscriptions: SubscriptionManager,
}

impl DocumentStore {
    /// Create a store holding `initial` at version 1.
    pub fn new(initial: impl Into<String>) -> Self {
        Self::with_config(StoreConfig {
            initial_content: initial.into(),
            ..Default::default()
        })
    }

    pub fn with_config(config: StoreConfig) -> Self {
        info!(
            bytes = config.initial_content.len(),
            buffer = config.subscriber_buffer,
            "document store created"
        );

        Self {
            state: RwLock::new(DocumentState {
                content: Arc::from(config.initial_content),
                version: Version::INITIAL,
            }),
            subscriptions: SubscriptionManager::with_buffer_size(config.subscriber_buffer),
        }
    }

    // --- Document Operations ---

    /// Current content and version, read as one pair.
    pub fn get(&self) -> Snapshot {
        let state = self.state.read();
        Snapshot {
            content: Arc::clone(&state.content),
            version: state.version,
        }
    }

    /// Current version only.
    pub fn version(&self) -> Version {
        self.state.read().version
    }

    /// Replace the content and notify subscribers. Returns the new version.
    ///
    /// Identical content still counts as a write. The event goes out only
    /// after the content lock is released, so anyone reacting to it with
    /// [`get`](Self::get) sees at least this version.
    pub fn set(&self, content: impl Into<String>, source: impl Into<String>) -> Version {
        let content: Arc<str> = Arc::from(content.into());

        let version = {
            let mut state = self.state.write();
            state.version = state.version.next();
            state.content = Arc::clone(&content);
            state.version
        };

        let source = source.into();
        let stats = self.subscriptions.broadcast(ChangeEvent {
            content,
            source,
            version,
        });
        log_broadcast(version, stats);

        version
    }

    // --- Subscription Operations ---

    /// Register a new subscriber. The caller must pass the id back to
    /// [`unsubscribe`](Self::unsubscribe) when done.
    pub fn subscribe(&self) -> SubscriptionHandle {
        self.subscriptions.subscribe()
    }

    /// Register a subscriber that unregisters itself when dropped.
    pub fn subscribe_scoped(&self) -> ScopedSubscription<'_> {
        self.subscriptions.subscribe_scoped()
    }

    /// Remove a subscriber. A no-op for ids that are unknown or already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscriptions.unsubscribe(id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.subscription_count()
    }
}

impl Default for DocumentStore {
    fn default() -> Self {
        Self::with_config(StoreConfig::default())
    }
}

fn log_broadcast(version: Version, stats: BroadcastStats) {
    if stats.dropped > 0 || stats.pruned > 0 {
        debug!(
            %version,
            delivered = stats.delivered,
            dropped = stats.dropped,
            pruned = stats.pruned,
            "broadcast with losses"
        );
    }
}
