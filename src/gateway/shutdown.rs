//! Cancellation shared by the request loop and every open stream.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use tiny_http::Server;
use tracing::info;

/// Cloneable handle that stops the gateway.
///
/// Triggering drops the only sender of the shutdown channel, so every
/// receiver (one per open change stream) wakes up at once, and unblocks the
/// HTTP accept loop.
#[derive(Clone)]
pub struct ShutdownHandle {
    trigger: Arc<Mutex<Option<Sender<()>>>>,
    listener: Receiver<()>,
    server: Arc<Server>,
}

impl ShutdownHandle {
    pub(crate) fn new(server: Arc<Server>) -> Self {
        let (tx, rx) = bounded(0);
        Self {
            trigger: Arc::new(Mutex::new(Some(tx))),
            listener: rx,
            server,
        }
    }

    /// Stop accepting requests and cancel all open streams. Idempotent.
    pub fn trigger(&self) {
        if self.trigger.lock().take().is_some() {
            info!("gateway shutting down");
            self.server.unblock();
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.trigger.lock().is_none()
    }

    /// Becomes ready (disconnected) once [`trigger`](Self::trigger) runs.
    pub fn listener(&self) -> &Receiver<()> {
        &self.listener
    }
}
