//! Error types for the editor backend.
//!
//! The document store itself cannot fail once constructed; everything here
//! belongs to the gateway boundary and the collaborators around it.

use std::net::SocketAddr;
use thiserror::Error;

/// Main error type for editor operations.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid download: {0}")]
    InvalidDownload(String),

    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: SocketAddr, reason: String },

    #[error("State directory is locked by another process")]
    Locked,

    #[error("Forwarding to running instance failed: {0}")]
    Forward(String),
}

impl EditorError {
    /// HTTP status code used when this error reaches a client.
    pub fn status_code(&self) -> u16 {
        match self {
            EditorError::InvalidJson(_)
            | EditorError::InvalidRequest(_)
            | EditorError::InvalidDownload(_) => 400,
            _ => 500,
        }
    }
}

/// Result type for editor operations.
pub type Result<T> = std::result::Result<T, EditorError>;
