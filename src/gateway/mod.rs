//! HTTP gateway in front of the document store.
//!
//! Routes:
//! - `GET  /api/diagram`     current content and version
//! - `PUT  /api/diagram`     replace content, returns the new version
//! - `GET  /api/events`      Server-Sent Events change stream
//! - `GET  /api/preferences` stored preferences (`{}` when none)
//! - `PUT  /api/preferences` replace stored preferences
//! - `POST /api/download`    echo posted data back as an attachment
//! - `POST /api/quit`        stop the gateway
//!
//! Each request runs on its own thread. Change streams hold their thread
//! for the life of the connection, so a fixed pool would let a handful of
//! open browser tabs starve ordinary reads and writes.

mod handlers;
mod response;
mod shutdown;
mod stream;

pub use handlers::WriteRequest;
pub use shutdown::ShutdownHandle;
pub use stream::{frame, serve_events, StreamEnd};

use crate::config::default_state_dir;
use crate::error::{EditorError, Result};
use crate::preferences::Preferences;
use crate::store::DocumentStore;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tiny_http::{Method, Request, Server};
use tracing::{debug, info, warn};

/// Maximum number of port binding attempts for a fixed port.
const MAX_PORT_RETRIES: u16 = 10;

/// Gateway configuration.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Listen address. Port 0 picks a free port.
    pub addr: SocketAddr,

    /// Idle time after which a change stream sends a keep-alive comment.
    /// Default: 15s
    pub keepalive_interval: Duration,

    /// Where preferences live.
    pub state_dir: PathBuf,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            keepalive_interval: Duration::from_secs(15),
            state_dir: default_state_dir(),
        }
    }
}

/// Shared by every request thread.
pub(crate) struct Context {
    pub(crate) store: Arc<DocumentStore>,
    pub(crate) preferences: Preferences,
    pub(crate) keepalive_interval: Duration,
    pub(crate) shutdown: ShutdownHandle,
}

/// Bound server ready to accept requests.
pub struct Gateway {
    server: Arc<Server>,
    addr: SocketAddr,
    ctx: Arc<Context>,
}

impl Gateway {
    /// Bind the listener without starting the request loop.
    pub fn bind(store: Arc<DocumentStore>, config: GatewayConfig) -> Result<Self> {
        let (server, addr) = bind_with_retry(config.addr)?;
        let server = Arc::new(server);

        let ctx = Arc::new(Context {
            store,
            preferences: Preferences::in_dir(&config.state_dir),
            keepalive_interval: config.keepalive_interval,
            shutdown: ShutdownHandle::new(Arc::clone(&server)),
        });

        info!("listening on http://{addr}");
        Ok(Self { server, addr, ctx })
    }

    /// Get the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Handle that stops [`run`](Self::run) and cancels open streams.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.ctx.shutdown.clone()
    }

    /// Serve requests until shutdown is triggered (blocking).
    pub fn run(self) {
        for request in self.server.incoming_requests() {
            if self.ctx.shutdown.is_triggered() {
                let _ = response::send_status(request, 503);
                continue;
            }

            let ctx = Arc::clone(&self.ctx);
            let spawned = thread::Builder::new()
                .name("gateway-request".to_string())
                .spawn(move || {
                    if let Err(e) = route(request, &ctx) {
                        warn!(error = %e, "request failed");
                    }
                });
            if let Err(e) = spawned {
                warn!(error = %e, "failed to spawn request thread");
            }
        }
        debug!("request loop finished");
    }
}

fn route(request: Request, ctx: &Context) -> Result<()> {
    debug!(method = %request.method(), url = request.url(), "request");

    let path = request.url().split('?').next().unwrap_or_default();
    match (request.method(), path) {
        (Method::Get, "/api/diagram") => handlers::get_document(request, ctx),
        (Method::Put, "/api/diagram") => handlers::set_document(request, ctx),
        (Method::Get, "/api/events") => handlers::event_stream(request, ctx),
        (Method::Get, "/api/preferences") => handlers::get_preferences(request, ctx),
        (Method::Put, "/api/preferences") => handlers::set_preferences(request, ctx),
        (Method::Post, "/api/download") => handlers::download(request, ctx),
        (Method::Post, "/api/quit") => handlers::quit(request, ctx),
        (
            _,
            "/api/diagram" | "/api/events" | "/api/preferences" | "/api/download" | "/api/quit",
        ) => response::method_not_allowed(request),
        _ => response::not_found(request),
    }
}

/// Bind to `addr`. A fixed port that is taken is retried on the next few
/// ports up.
fn bind_with_retry(addr: SocketAddr) -> Result<(Server, SocketAddr)> {
    let retries = if addr.port() == 0 { 1 } else { MAX_PORT_RETRIES };
    let mut last_error = String::new();

    for offset in 0..retries {
        let candidate = SocketAddr::new(addr.ip(), addr.port().saturating_add(offset));
        match Server::http(candidate) {
            Ok(server) => {
                let bound = server.server_addr().to_ip().unwrap_or(candidate);
                if offset > 0 {
                    info!("port {} in use, using {} instead", addr.port(), bound.port());
                }
                return Ok((server, bound));
            }
            Err(e) => last_error = e.to_string(),
        }
    }

    Err(EditorError::Bind {
        addr,
        reason: last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_ephemeral_port() {
        let (_server, addr) = bind_with_retry("127.0.0.1:0".parse().unwrap()).unwrap();
        assert_ne!(addr.port(), 0);
    }

    #[test]
    fn test_bind_retries_next_port() {
        let (_first, taken) = bind_with_retry("127.0.0.1:0".parse().unwrap()).unwrap();

        let (_second, addr) = bind_with_retry(taken).unwrap();
        assert_ne!(addr.port(), taken.port());
        assert!(addr.port() > taken.port());
    }
}
