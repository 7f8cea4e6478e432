//! Single-instance coordination through the state directory.
//!
//! The first process to take an exclusive lock on `instance.lock` owns the
//! document and publishes its port in `port`. A later process finds the
//! lock held and reads the port to reach the running editor instead.

use crate::error::{EditorError, Result};
use crate::types::{source, Version, WriteReceipt};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const LOCK_FILE: &str = "instance.lock";
const PORT_FILE: &str = "port";

/// Outcome of trying to become the running instance.
#[derive(Debug)]
pub enum Claim {
    /// We own the state directory until the lock is dropped.
    Owned(InstanceLock),
    /// Another live process owns it and serves at this URL.
    Running { url: String },
}

/// Held for as long as this process is the editor instance.
#[derive(Debug)]
pub struct InstanceLock {
    _lock_file: File,
    port_path: PathBuf,
}

impl InstanceLock {
    /// Record the bound address so other processes can find us.
    pub fn publish(&self, addr: SocketAddr) -> Result<()> {
        fs::write(&self.port_path, addr.port().to_string())?;
        debug!(port = addr.port(), "instance published");
        Ok(())
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.port_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %e, "failed to remove port file");
            }
        }
    }
}

/// Try to become the editor instance for `state_dir`.
///
/// Fails with [`EditorError::Locked`] when the lock is held but the owner
/// has not published a port yet.
pub fn claim(state_dir: &Path) -> Result<Claim> {
    fs::create_dir_all(state_dir)?;

    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(state_dir.join(LOCK_FILE))?;

    if lock_file.try_lock_exclusive().is_ok() {
        return Ok(Claim::Owned(InstanceLock {
            _lock_file: lock_file,
            port_path: state_dir.join(PORT_FILE),
        }));
    }

    match read_port(state_dir) {
        Some(port) => Ok(Claim::Running {
            url: format!("http://127.0.0.1:{port}"),
        }),
        None => Err(EditorError::Locked),
    }
}

/// Replace the document of the instance at `base_url`, tagged as coming
/// from the command line.
pub fn push_document(base_url: &str, content: &str) -> Result<Version> {
    let body = serde_json::json!({
        "content": content,
        "source": source::CLI,
    });

    let response = ureq::put(&format!("{base_url}/api/diagram"))
        .set("Content-Type", "application/json")
        .send_string(&body.to_string())
        .map_err(|e| EditorError::Forward(e.to_string()))?;
    let text = response.into_string()?;
    let receipt: WriteReceipt = serde_json::from_str(&text)?;

    debug!(url = base_url, version = %receipt.version, "document pushed");
    Ok(receipt.version)
}

fn read_port(state_dir: &Path) -> Option<u16> {
    fs::read_to_string(state_dir.join(PORT_FILE))
        .ok()?
        .trim()
        .parse()
        .ok()
}
