//! Core types for the document store.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Version counter of the shared document.
///
/// Starts at 1 when the store is created and moves up by exactly one per
/// write. Serializes as a bare integer.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(pub u64);

impl Version {
    /// Version of a freshly created document.
    pub const INITIAL: Version = Version(1);

    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Well-known write origins.
pub mod source {
    /// Used when a writer does not say where the write came from.
    pub const API: &str = "api";
    /// Content pushed from the command line to an already running instance.
    pub const CLI: &str = "cli";
}

/// A consistent `(content, version)` pair read from the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Snapshot {
    pub content: Arc<str>,
    pub version: Version,
}

impl Snapshot {
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Result of a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteReceipt {
    pub version: Version,
}
