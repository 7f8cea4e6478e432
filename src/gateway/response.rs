//! HTTP response helpers.

use crate::error::{EditorError, Result};
use serde::Serialize;
use tiny_http::{Header, Request, Response, StatusCode};

pub const JSON: &str = "application/json";
pub const PLAIN: &str = "text/plain; charset=utf-8";

/// Respond with `value` serialized as JSON.
pub fn send_json<T: Serialize>(request: Request, status: u16, value: &T) -> Result<()> {
    let body = serde_json::to_vec(value)?;
    send_body(request, status, JSON, body)
}

pub fn send_body(request: Request, status: u16, content_type: &str, body: Vec<u8>) -> Result<()> {
    let response = Response::from_data(body)
        .with_status_code(StatusCode(status))
        .with_header(make_header("Content-Type", content_type)?);
    request.respond(response)?;
    Ok(())
}

/// Respond with a status and no body.
pub fn send_status(request: Request, status: u16) -> Result<()> {
    request.respond(Response::empty(StatusCode(status)))?;
    Ok(())
}

/// Respond with a plain-text message.
pub fn send_text(request: Request, status: u16, message: &str) -> Result<()> {
    send_body(request, status, PLAIN, message.as_bytes().to_vec())
}

/// Report `err` to the client with its status code.
pub fn send_error(request: Request, err: &EditorError) -> Result<()> {
    send_text(request, err.status_code(), &err.to_string())
}

pub fn not_found(request: Request) -> Result<()> {
    send_text(request, 404, "404 Not Found")
}

pub fn method_not_allowed(request: Request) -> Result<()> {
    send_text(request, 405, "405 Method Not Allowed")
}

pub fn make_header(key: &str, value: &str) -> Result<Header> {
    Header::from_bytes(key, value)
        .map_err(|_| EditorError::InvalidRequest(format!("invalid header value for {key}")))
}
