//! Seam between the conversation engine and whatever produces the byte stream.

use crate::error::TransportError;
use chatstream_types::{ChatMessage, ChatRole};
use serde::Serialize;
use std::future::Future;
use tokio::io::AsyncRead;

/// Content type a response stream must carry.
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Boxed response body.
pub type ResponseBody = Box<dyn AsyncRead + Send + Unpin>;

/// Prior turn forwarded to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub role: ChatRole,
    pub content: String,
}

/// Everything the backend needs to produce one response.
#[derive(Debug, Clone, Serialize)]
pub struct TurnRequest {
    pub message: String,
    pub chat_history: Vec<HistoryEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selected_context: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl TurnRequest {
    /// Build a request from the messages preceding the new user turn.
    /// Streaming and failed messages are left out of the history.
    pub fn new(message: impl Into<String>, previous: &[ChatMessage]) -> Self {
        let chat_history = previous
            .iter()
            .filter(|m| !m.is_streaming && !m.is_error && !m.content.is_empty())
            .map(|m| HistoryEntry {
                role: m.role,
                content: m.content.clone(),
            })
            .collect();
        Self {
            message: message.into(),
            chat_history,
            selected_context: None,
            action: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.selected_context = context;
        self
    }

    pub fn with_action(mut self, action: Option<String>) -> Self {
        self.action = action;
        self
    }
}

/// Raw response before any event is decoded.
pub struct TransportResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: ResponseBody,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .finish_non_exhaustive()
    }
}

impl TransportResponse {
    /// Validate status and content type, yielding the readable body.
    pub fn into_body(self) -> Result<ResponseBody, TransportError> {
        if !(200..300).contains(&self.status) {
            return Err(TransportError::Status(self.status));
        }
        match self.content_type.as_deref() {
            Some(ct) if ct.trim_start().to_ascii_lowercase().starts_with(EVENT_STREAM_CONTENT_TYPE) => {
                Ok(self.body)
            }
            other => Err(TransportError::ContentType(
                other.unwrap_or("<missing>").to_string(),
            )),
        }
    }
}

/// Produces a response stream for a turn.
pub trait Transport {
    fn open(
        &self,
        request: &TurnRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportError>> + Send;
}

/// Serves a captured event stream, for replays and tests.
#[derive(Debug, Clone)]
pub struct ReplayTransport {
    bytes: Vec<u8>,
    status: u16,
    content_type: String,
}

impl ReplayTransport {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
            status: 200,
            content_type: EVENT_STREAM_CONTENT_TYPE.to_string(),
        }
    }

    /// Read a capture from disk.
    pub async fn from_file(path: &std::path::Path) -> Result<Self, TransportError> {
        Ok(Self::new(tokio::fs::read(path).await?))
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl Transport for ReplayTransport {
    async fn open(&self, _request: &TurnRequest) -> Result<TransportResponse, TransportError> {
        Ok(TransportResponse {
            status: self.status,
            content_type: Some(self.content_type.clone()),
            body: Box::new(std::io::Cursor::new(self.bytes.clone())),
        })
    }
}
