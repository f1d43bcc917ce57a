//! Error types for chatstream.

use thiserror::Error;

/// Failures raised before any stream event is produced.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Unexpected response status: {0}")]
    Status(u16),

    #[error("Unexpected content type: {0}")]
    ContentType(String),

    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ChatStreamError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("A response is still streaming in session {0}")]
    TurnInProgress(String),

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
