//! Server-Sent Events change stream.
//!
//! One call to [`serve_events`] serves one connection for its whole life:
//!
//! ```text
//! OPEN -> WAITING <-> DELIVERING
//!            |
//!            v
//!         CLOSING (unsubscribe) -> CLOSED
//! ```

use crate::store::DocumentStore;
use crate::subscriptions::ChangeEvent;
use crossbeam_channel::{select, Receiver};
use std::io::{self, Write};
use std::time::Duration;
use tracing::debug;

/// Status line and headers, written raw since the body never ends on its
/// own. The connection closes when the stream does.
const SSE_HEAD: &[u8] = b"HTTP/1.1 200 OK\r\n\
Content-Type: text/event-stream\r\n\
Cache-Control: no-cache\r\n\
Connection: close\r\n\
\r\n";

/// Comment frame sent while idle; surfaces dead connections as write errors.
const KEEPALIVE_FRAME: &[u8] = b": keep-alive\n\n";

/// Why a change stream ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamEnd {
    /// Writing to the client failed.
    Disconnected,
    /// The gateway is shutting down.
    Shutdown,
    /// The subscription was removed from the store by someone else.
    Unsubscribed,
}

/// Encode one event as a single `data:` frame.
pub fn frame(event: &ChangeEvent) -> serde_json::Result<Vec<u8>> {
    let json = serde_json::to_vec(event)?;
    let mut buf = Vec::with_capacity(json.len() + 8);
    buf.extend_from_slice(b"data: ");
    buf.extend_from_slice(&json);
    buf.extend_from_slice(b"\n\n");
    Ok(buf)
}

/// Serve a change stream until the client leaves or `cancel` fires.
///
/// The subscription is registered before the headers go out, so a client
/// that has seen the headers will see every later write (buffer permitting).
/// It is released on every return path.
pub fn serve_events<W: Write>(
    store: &DocumentStore,
    out: &mut W,
    cancel: &Receiver<()>,
    keepalive: Duration,
) -> StreamEnd {
    let sub = store.subscribe_scoped();
    let id = sub.id().0;
    debug!(subscription = id, "change stream opened");

    if let Err(e) = write_flush(out, SSE_HEAD) {
        debug!(subscription = id, error = %e, "client gone before headers");
        return StreamEnd::Disconnected;
    }

    let events = &sub.receiver;
    let end = loop {
        select! {
            recv(events) -> msg => {
                let Ok(event) = msg else {
                    break StreamEnd::Unsubscribed;
                };
                let bytes = match frame(&event) {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        debug!(subscription = id, error = %e, "skipping unencodable event");
                        continue;
                    }
                };
                if let Err(e) = write_flush(out, &bytes) {
                    debug!(subscription = id, error = %e, "write failed");
                    break StreamEnd::Disconnected;
                }
            }
            recv(cancel) -> _ => break StreamEnd::Shutdown,
            default(keepalive) => {
                if let Err(e) = write_flush(out, KEEPALIVE_FRAME) {
                    debug!(subscription = id, error = %e, "keep-alive failed");
                    break StreamEnd::Disconnected;
                }
            }
        }
    };

    debug!(subscription = id, reason = ?end, "change stream closed");
    end
}

fn write_flush<W: Write>(out: &mut W, bytes: &[u8]) -> io::Result<()> {
    out.write_all(bytes)?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Version;
    use crossbeam_channel::bounded;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    /// Writer whose contents the test can watch from another thread.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock()).into_owned()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    /// Writer that accepts a fixed number of bytes, then fails.
    struct BrokenPipe {
        remaining: usize,
    }

    impl Write for BrokenPipe {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.remaining == 0 {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer closed"));
            }
            let n = buf.len().min(self.remaining);
            self.remaining -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    #[test]
    fn test_frame_format() {
        let event = ChangeEvent {
            content: Arc::from("a\nb"),
            source: "mcp".to_string(),
            version: Version(4),
        };
        let bytes = frame(&event).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "data: {\"content\":\"a\\nb\",\"source\":\"mcp\",\"version\":4}\n\n"
        );
    }

    #[test]
    fn test_stream_delivers_then_shuts_down() {
        let store = Arc::new(DocumentStore::new("initial"));
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let buf = SharedBuf::default();

        let worker = {
            let store = Arc::clone(&store);
            let mut out = buf.clone();
            thread::spawn(move || {
                serve_events(&store, &mut out, &cancel_rx, Duration::from_secs(60))
            })
        };

        assert!(wait_until(|| buf.text().contains("text/event-stream")));
        assert_eq!(store.subscriber_count(), 1);

        store.set("live update", "mcp");
        assert!(wait_until(|| buf.text().contains("live update")));
        assert!(buf.text().contains(r#""source":"mcp""#));

        drop(cancel_tx);
        assert_eq!(worker.join().unwrap(), StreamEnd::Shutdown);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_one_frame_per_write() {
        let store = Arc::new(DocumentStore::new(""));
        let (cancel_tx, cancel_rx) = bounded::<()>(0);
        let buf = SharedBuf::default();

        let worker = {
            let store = Arc::clone(&store);
            let mut out = buf.clone();
            thread::spawn(move || {
                serve_events(&store, &mut out, &cancel_rx, Duration::from_secs(60))
            })
        };

        assert!(wait_until(|| store.subscriber_count() == 1));
        store.set("one", "api");
        store.set("two", "api");
        store.set("three", "api");

        assert!(wait_until(|| buf.text().matches("data: ").count() == 3));

        drop(cancel_tx);
        worker.join().unwrap();
    }

    #[test]
    fn test_disconnect_detected_by_keepalive() {
        let store = DocumentStore::new("");
        let (_cancel_tx, cancel_rx) = bounded::<()>(0);
        let mut out = BrokenPipe {
            remaining: SSE_HEAD.len(),
        };

        let end = serve_events(&store, &mut out, &cancel_rx, Duration::from_millis(10));

        assert_eq!(end, StreamEnd::Disconnected);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_disconnect_before_headers() {
        let store = DocumentStore::new("");
        let (_cancel_tx, cancel_rx) = bounded::<()>(0);
        let mut out = BrokenPipe { remaining: 0 };

        let end = serve_events(&store, &mut out, &cancel_rx, Duration::from_secs(60));

        assert_eq!(end, StreamEnd::Disconnected);
        assert_eq!(store.subscriber_count(), 0);
    }

    #[test]
    fn test_write_after_disconnect_does_not_panic() {
        let store = DocumentStore::new("");
        let (_cancel_tx, cancel_rx) = bounded::<()>(0);
        let mut out = BrokenPipe { remaining: 0 };

        serve_events(&store, &mut out, &cancel_rx, Duration::from_secs(60));
        assert_eq!(store.set("after disconnect", "api"), Version(2));
    }
}
