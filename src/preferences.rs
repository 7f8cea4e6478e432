//! User preferences persisted as one JSON object.
//!
//! The editor front-end owns the keys; this side only checks that the blob
//! is a JSON object and keeps it on disk.

use crate::error::{EditorError, Result};
use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

const PREFERENCES_FILE: &str = "preferences.json";

pub struct Preferences {
    path: PathBuf,
}

impl Preferences {
    /// Preferences stored in `state_dir/preferences.json`.
    pub fn in_dir(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(PREFERENCES_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored preferences as raw JSON, or `{}` when nothing was saved yet.
    pub fn load_raw(&self) -> Result<Vec<u8>> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(b"{}".to_vec()),
            Err(e) => Err(e.into()),
        }
    }

    /// Validate `body` as a JSON object and persist it.
    pub fn save_raw(&self, body: &[u8]) -> Result<()> {
        let prefs: Map<String, Value> = serde_json::from_slice(body)?;
        self.save(&prefs)
    }

    pub fn save(&self, prefs: &Map<String, Value>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_vec(prefs)?;
        fs::write(&self.path, data)?;
        debug!(path = %self.path.display(), keys = prefs.len(), "preferences saved");
        Ok(())
    }

    /// Stored preferences, parsed.
    pub fn load(&self) -> Result<Map<String, Value>> {
        let raw = self.load_raw()?;
        serde_json::from_slice(&raw).map_err(EditorError::from)
    }
}
