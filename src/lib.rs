//! # Mermaid Editor Backend
//!
//! A single diagram document shared by every surface that edits it: the
//! editor window, browser tabs, and external tools.
//!
//! ## Core Concepts
//!
//! - **Document Store**: content plus a version that moves up by one per write
//! - **Subscriptions**: bounded per-consumer channels fed by every write;
//!   a slow consumer loses events instead of slowing writers
//! - **Gateway**: HTTP read/write endpoints and a Server-Sent Events stream
//!
//! ## Example
//!
//! ```ignore
//! use mermaid_editor::{DocumentStore, Gateway, GatewayConfig};
//! use std::sync::Arc;
//!
//! let store = Arc::new(DocumentStore::new("graph TD\n  A-->B"));
//!
//! let sub = store.subscribe_scoped();
//! store.set("graph TD\n  A-->C", "editor");
//! assert_eq!(sub.recv()?.version.0, 2);
//!
//! let gateway = Gateway::bind(Arc::clone(&store), GatewayConfig::default())?;
//! println!("serving at {}", gateway.url());
//! gateway.run();
//! ```

pub mod config;
pub mod download;
pub mod error;
pub mod gateway;
pub mod instance;
pub mod preferences;
pub mod store;
pub mod subscriptions;
pub mod types;

// Re-exports
pub use config::{default_state_dir, EditorConfig};
pub use error::{EditorError, Result};
pub use gateway::{Gateway, GatewayConfig, ShutdownHandle, StreamEnd, WriteRequest};
pub use instance::{Claim, InstanceLock};
pub use store::{DocumentStore, StoreConfig};
pub use subscriptions::{
    BroadcastStats, ChangeEvent, ScopedSubscription, SubscriptionHandle, SubscriptionId,
    SubscriptionManager, DEFAULT_BUFFER_SIZE,
};
pub use types::*;
