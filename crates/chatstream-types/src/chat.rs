//! Chat message types.
//!
//! A `ChatMessage` is owned by its session. Assistant messages are mutated
//! while `is_streaming` is set and frozen once the stream completes or fails.

use crate::Activity;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier
    pub id: String,
    /// Who sent this message
    pub role: ChatRole,
    /// Clean, tag-stripped text
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Structured automation definition emitted by the stream
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_payload: Option<Map<String, Value>>,
    /// Tool activities, ordered by start time
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_metadata: Option<SearchMetadata>,
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub is_error: bool,
}

/// Role of the message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// Annotations the model embeds inline in its narrative text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchMetadata {
    /// Self-assessed search quality, 0..=5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queries: Option<Vec<String>>,
}

impl SearchMetadata {
    pub fn is_empty(&self) -> bool {
        self.quality_score.is_none() && self.explanation.is_none() && self.queries.is_none()
    }
}

impl ChatMessage {
    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(format!("user-{}", Uuid::new_v4()), ChatRole::User, content.into(), false)
    }

    /// Create an assistant message that is about to receive a stream.
    pub fn assistant_streaming() -> Self {
        Self::new(format!("assistant-{}", Uuid::new_v4()), ChatRole::Assistant, String::new(), true)
    }

    /// Create a finished assistant message, e.g. the greeting of a new session.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(format!("assistant-{}", Uuid::new_v4()), ChatRole::Assistant, content.into(), false)
    }

    fn new(id: String, role: ChatRole, content: String, is_streaming: bool) -> Self {
        Self {
            id,
            role,
            content,
            timestamp: Utc::now(),
            workflow_payload: None,
            activities: Vec::new(),
            search_metadata: None,
            is_streaming,
            is_error: false,
        }
    }

    /// Mark the message as complete.
    pub fn complete(&mut self) {
        self.is_streaming = false;
        self.is_error = false;
    }

    /// Mark the message as failed, replacing its text with `content`.
    pub fn fail(&mut self, content: String) {
        self.content = content;
        self.is_streaming = false;
        self.is_error = true;
    }

    pub fn is_user(&self) -> bool {
        self.role == ChatRole::User
    }
}

/// A change to an in-flight message, published in event order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageUpdate {
    /// Clean content or metadata was re-derived from the text buffer
    ContentChanged {
        message_id: String,
        content: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        search_metadata: Option<SearchMetadata>,
    },
    /// A workflow payload was attached
    WorkflowSet {
        message_id: String,
        payload: Map<String, Value>,
    },
    ActivityStarted {
        message_id: String,
        activity: Activity,
    },
    ActivityUpdated {
        message_id: String,
        activity: Activity,
    },
    ActivityFinished {
        message_id: String,
        activity: Activity,
    },
    /// The message reached a terminal state
    Finalized { message: ChatMessage },
}
