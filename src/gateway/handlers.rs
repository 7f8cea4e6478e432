//! Route handlers.

use super::response::{self, make_header};
use super::stream::serve_events;
use super::Context;
use crate::download::Download;
use crate::error::{EditorError, Result};
use crate::store::DocumentStore;
use crate::types::{source, Version, WriteReceipt};
use serde::Deserialize;
use std::io::Read;
use tiny_http::{Request, Response, StatusCode};
use tracing::{debug, info, warn};

/// Body of a document write.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct WriteRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub source: Option<String>,
}

impl WriteRequest {
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(EditorError::from)
    }

    /// Origin label, falling back to the generic API label when missing or
    /// empty.
    pub fn source(&self) -> &str {
        match self.source.as_deref() {
            Some(s) if !s.is_empty() => s,
            _ => source::API,
        }
    }

    pub fn apply(self, store: &DocumentStore) -> Version {
        let source = self.source().to_string();
        store.set(self.content, source)
    }
}

// --- Document ---

pub fn get_document(request: Request, ctx: &Context) -> Result<()> {
    response::send_json(request, 200, &ctx.store.get())
}

pub fn set_document(mut request: Request, ctx: &Context) -> Result<()> {
    let body = read_body(&mut request)?;
    let write = match WriteRequest::parse(&body) {
        Ok(write) => write,
        Err(e) => {
            debug!(error = %e, "rejected document write");
            return response::send_error(request, &e);
        }
    };

    let version = write.apply(&ctx.store);
    response::send_json(request, 200, &WriteReceipt { version })
}

pub fn event_stream(request: Request, ctx: &Context) -> Result<()> {
    let mut out = request.into_writer();
    serve_events(
        &ctx.store,
        &mut out,
        ctx.shutdown.listener(),
        ctx.keepalive_interval,
    );
    Ok(())
}

// --- Preferences ---

pub fn get_preferences(request: Request, ctx: &Context) -> Result<()> {
    let body = ctx.preferences.load_raw().unwrap_or_else(|e| {
        warn!(error = %e, "failed to read preferences, serving defaults");
        b"{}".to_vec()
    });
    response::send_body(request, 200, response::JSON, body)
}

pub fn set_preferences(mut request: Request, ctx: &Context) -> Result<()> {
    let body = read_body(&mut request)?;
    match ctx.preferences.save_raw(&body) {
        Ok(()) => response::send_status(request, 204),
        Err(e @ EditorError::InvalidJson(_)) => response::send_error(request, &e),
        Err(e) => {
            warn!(error = %e, "failed to save preferences");
            response::send_text(request, 500, "failed to save preferences")
        }
    }
}

// --- Download ---

pub fn download(mut request: Request, _ctx: &Context) -> Result<()> {
    let body = read_body(&mut request)?;
    let query = request
        .url()
        .split_once('?')
        .map(|(_, q)| q.as_bytes().to_vec())
        .unwrap_or_default();

    let download = match Download::from_forms(&[body.as_slice(), query.as_slice()]) {
        Ok(download) => download,
        Err(e) => return response::send_error(request, &e),
    };

    info!(
        filename = %download.filename,
        size = download.body.len(),
        "download staged"
    );

    let headers = make_header("Content-Type", &download.content_type).and_then(|content_type| {
        make_header("Content-Disposition", &download.disposition()).map(|d| (content_type, d))
    });
    let (content_type, disposition) = match headers {
        Ok(headers) => headers,
        Err(e) => return response::send_error(request, &e),
    };
    let response = Response::from_data(download.body)
        .with_status_code(StatusCode(200))
        .with_header(content_type)
        .with_header(disposition);
    request.respond(response)?;
    Ok(())
}

// --- Lifecycle ---

pub fn quit(request: Request, ctx: &Context) -> Result<()> {
    response::send_status(request, 204)?;
    ctx.shutdown.trigger();
    Ok(())
}

fn read_body(request: &mut Request) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    request.as_reader().read_to_end(&mut body)?;
    Ok(body)
}
