//! Top-level configuration.

use crate::gateway::GatewayConfig;
use crate::store::StoreConfig;
use std::path::PathBuf;

/// Directory name under the user cache dir.
const APP_DIR: &str = "mermaid-editor";

/// Per-user directory for the instance lock, port file, and preferences.
///
/// Falls back to the system temp dir when the platform has no cache dir.
pub fn default_state_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}

/// Everything needed to start an editor instance.
#[derive(Clone, Debug, Default)]
pub struct EditorConfig {
    pub store: StoreConfig,
    pub gateway: GatewayConfig,
}

impl EditorConfig {
    pub fn state_dir(&self) -> &PathBuf {
        &self.gateway.state_dir
    }
}
