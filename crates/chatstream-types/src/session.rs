//! Conversation sessions.

use crate::{ChatMessage, ChatRole};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A persisted, ordered conversation thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    /// Messages in insertion order
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    /// Only ever advances
    pub updated_at: DateTime<Utc>,
}

/// Summary view of a session for listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create a session holding only a greeting from the assistant.
    pub fn new(welcome_message: &str) -> Self {
        let now = Utc::now();
        let mut session = Self {
            id: format!("chat-{}", Uuid::new_v4()),
            title: String::new(),
            messages: vec![ChatMessage::assistant(welcome_message)],
            created_at: now,
            updated_at: now,
        };
        session.title = session.default_title();
        session
    }

    /// Whether anyone has actually said something in this session.
    pub fn has_user_message(&self) -> bool {
        self.messages.iter().any(|m| m.role == ChatRole::User)
    }

    /// The message currently receiving a stream, if any.
    pub fn streaming_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.is_streaming)
    }

    pub fn message_mut(&mut self, id: &str) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| m.id == id)
    }

    /// Title taken from the first user message, truncated to `max_chars`
    /// characters with an ellipsis.
    pub fn derive_title(&self, max_chars: usize) -> String {
        let Some(first) = self.messages.iter().find(|m| m.is_user()) else {
            return self.default_title();
        };
        let text = first.content.trim();
        if text.chars().count() > max_chars {
            let truncated: String = text.chars().take(max_chars).collect();
            format!("{}...", truncated)
        } else {
            text.to_string()
        }
    }

    fn default_title(&self) -> String {
        format!("New Chat {}", self.created_at.format("%Y-%m-%d %H:%M"))
    }

    /// Advance `updated_at` to `now` unless it is already later.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            message_count: self.messages.len(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
