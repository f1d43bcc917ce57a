//! Conversation sessions and their persistence.
//!
//! Storage layout: one key holds a JSON array of every persisted session,
//! another holds the id of the current session. Sessions without a user
//! message are never written.

use crate::activity::{ActivityFeed, MAX_FEED_ACTIVITIES};
use crate::store::KeyValueStore;
use crate::transport::TurnRequest;
use crate::{ChatStreamError, Result};
use chatstream_types::{Activity, ChatMessage, ChatSession, SessionSummary};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Key holding the JSON array of persisted sessions.
pub const SESSIONS_KEY: &str = "chat_sessions";
/// Key holding the id of the current session.
pub const CURRENT_SESSION_KEY: &str = "current_chat_id";

pub const DEFAULT_WELCOME_MESSAGE: &str =
    "Hi! Describe the automation you need and I'll help you build it.";

const INTERRUPTED_MESSAGE: &str = "This response was interrupted before it finished.";

/// Configuration for the session manager.
#[derive(Debug, Clone)]
pub struct SessionManagerConfig {
    /// Greeting placed in every new session
    pub welcome_message: String,
    pub title_max_chars: usize,
    pub activity_feed_capacity: usize,
}

impl Default for SessionManagerConfig {
    fn default() -> Self {
        Self {
            welcome_message: DEFAULT_WELCOME_MESSAGE.to_string(),
            title_max_chars: 50,
            activity_feed_capacity: MAX_FEED_ACTIVITIES,
        }
    }
}

/// A user turn accepted by `SessionManager::begin_turn`.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub session_id: String,
    /// Request to hand to the transport
    pub request: TurnRequest,
    /// Streaming assistant message awaiting events
    pub message: ChatMessage,
}

/// Owns every session and the notion of a current one.
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    config: SessionManagerConfig,
    sessions: Vec<ChatSession>,
    current_id: String,
    feed: ActivityFeed,
}

impl SessionManager {
    /// Restore sessions from the store. A missing or dangling current id
    /// starts a fresh session.
    pub fn load(store: Arc<dyn KeyValueStore>, config: SessionManagerConfig) -> Self {
        let mut sessions = read_sessions(store.as_ref());
        for session in &mut sessions {
            recover_interrupted(session);
        }

        let stored_current = match store.get(CURRENT_SESSION_KEY) {
            Ok(id) => id,
            Err(e) => {
                warn!(target: "chatstream::store", "Failed to read current session id: {}", e);
                None
            }
        };

        let feed = ActivityFeed::with_capacity(config.activity_feed_capacity);
        let mut manager = Self {
            store,
            config,
            sessions,
            current_id: String::new(),
            feed,
        };

        match stored_current.filter(|id| manager.get(id).is_some()) {
            Some(id) => {
                debug!(target: "chatstream::store", "Restored current session {}", id);
                manager.current_id = id;
            }
            None => {
                manager.create_session();
            }
        }

        info!(
            target: "chatstream::store",
            "Loaded {} sessions", manager.sessions.len()
        );
        manager
    }

    /// Start a new session holding only the greeting and make it current.
    pub fn create_session(&mut self) -> &ChatSession {
        let session = ChatSession::new(&self.config.welcome_message);
        debug!(target: "chatstream::store", "Created session {}", session.id);
        self.current_id = session.id.clone();
        self.sessions.push(session);
        self.write_current_id();
        self.current()
    }

    pub fn current(&self) -> &ChatSession {
        // `current_id` always names a session held in `sessions`
        let idx = self.index_of(&self.current_id).unwrap_or(self.sessions.len() - 1);
        &self.sessions[idx]
    }

    pub fn current_id(&self) -> &str {
        &self.current_id
    }

    pub fn get(&self, id: &str) -> Option<&ChatSession> {
        self.sessions.iter().find(|s| s.id == id)
    }

    /// Sessions most recently updated first.
    pub fn list(&self) -> Vec<SessionSummary> {
        let mut summaries: Vec<SessionSummary> =
            self.sessions.iter().map(ChatSession::summary).collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Recent activities across every turn run through this manager.
    pub fn activity_feed(&self) -> &ActivityFeed {
        &self.feed
    }

    pub fn record_activity(&mut self, activity: &Activity) {
        self.feed.record(activity);
    }

    /// Make a stored session current.
    pub fn load_session(&mut self, id: &str) -> Result<&ChatSession> {
        if self.get(id).is_none() {
            return Err(ChatStreamError::SessionNotFound(id.to_string()));
        }
        self.current_id = id.to_string();
        self.write_current_id();
        Ok(self.current())
    }

    /// Delete a session. Deleting the current one falls back to the most
    /// recently updated remaining session, or a fresh one if none remain.
    pub fn delete_session(&mut self, id: &str) -> Result<()> {
        let idx = self
            .index_of(id)
            .ok_or_else(|| ChatStreamError::SessionNotFound(id.to_string()))?;
        self.sessions.remove(idx);
        info!(target: "chatstream::store", "Deleted session {}", id);

        if self.sessions.is_empty() {
            self.create_session();
        } else if self.current_id == id {
            if let Some(next) = self.sessions.iter().max_by_key(|s| s.updated_at) {
                self.current_id = next.id.clone();
            }
        }

        self.persist_logged();
        Ok(())
    }

    /// Remove every session and start over with exactly one fresh session.
    pub fn clear_all(&mut self) {
        self.sessions.clear();
        self.feed.clear();
        if let Err(e) = self.store.remove(SESSIONS_KEY) {
            warn!(target: "chatstream::store", "Failed to clear stored sessions: {}", e);
        }
        self.create_session();
        info!(target: "chatstream::store", "Cleared all sessions");
    }

    /// Accept a user turn in the current session. Rejected while a response
    /// is still streaming there.
    pub fn begin_turn(
        &mut self,
        content: &str,
        selected_context: Option<String>,
        action: Option<String>,
    ) -> Result<PendingTurn> {
        let session_id = self.current_id.clone();
        let idx = self
            .index_of(&session_id)
            .ok_or_else(|| ChatStreamError::SessionNotFound(session_id.clone()))?;
        let session = &mut self.sessions[idx];

        if session.streaming_message().is_some() {
            return Err(ChatStreamError::TurnInProgress(session_id));
        }

        let request = TurnRequest::new(content, &session.messages)
            .with_context(selected_context)
            .with_action(action);
        let message = ChatMessage::assistant_streaming();
        session.messages.push(ChatMessage::user(content));
        session.messages.push(message.clone());

        self.save_session(&session_id);
        Ok(PendingTurn {
            session_id,
            request,
            message,
        })
    }

    /// Replace a message with its updated copy and save its session. The
    /// message may belong to a session that is no longer current.
    pub fn commit_message(&mut self, message: ChatMessage) -> Result<()> {
        let session_id = self
            .sessions
            .iter()
            .find(|s| s.messages.iter().any(|m| m.id == message.id))
            .map(|s| s.id.clone())
            .ok_or_else(|| ChatStreamError::SessionNotFound(format!("message {}", message.id)))?;

        if let Some(session) = self.session_mut(&session_id) {
            if let Some(slot) = session.message_mut(&message.id) {
                *slot = message;
            }
        }
        self.save_session(&session_id);
        Ok(())
    }

    /// Write-through save of the current session.
    pub fn save_current_session(&mut self) {
        let id = self.current_id.clone();
        self.save_session(&id);
    }

    fn save_session(&mut self, id: &str) {
        let max_chars = self.config.title_max_chars;
        let Some(session) = self.session_mut(id) else {
            return;
        };
        if !session.has_user_message() {
            trace!(target: "chatstream::store", "Not persisting placeholder-only session {}", id);
            return;
        }
        session.title = session.derive_title(max_chars);
        session.touch(Utc::now());
        self.persist_logged();
    }

    /// Persistence failures never reach the caller.
    fn persist_logged(&self) {
        if let Err(e) = self.persist() {
            warn!(target: "chatstream::store", "Failed to persist sessions: {}", e);
        }
    }

    fn persist(&self) -> Result<()> {
        let persisted: Vec<&ChatSession> = self
            .sessions
            .iter()
            .filter(|s| s.has_user_message())
            .collect();
        let json = serde_json::to_string(&persisted)?;
        self.store.set(SESSIONS_KEY, &json)?;
        self.store.set(CURRENT_SESSION_KEY, &self.current_id)?;
        trace!(target: "chatstream::store", "Persisted {} sessions", persisted.len());
        Ok(())
    }

    fn write_current_id(&self) {
        if let Err(e) = self.store.set(CURRENT_SESSION_KEY, &self.current_id) {
            warn!(target: "chatstream::store", "Failed to store current session id: {}", e);
        }
    }

    fn index_of(&self, id: &str) -> Option<usize> {
        self.sessions.iter().position(|s| s.id == id)
    }

    fn session_mut(&mut self, id: &str) -> Option<&mut ChatSession> {
        self.sessions.iter_mut().find(|s| s.id == id)
    }
}

fn read_sessions(store: &dyn KeyValueStore) -> Vec<ChatSession> {
    let raw = match store.get(SESSIONS_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!(target: "chatstream::store", "Failed to read sessions: {}", e);
            return Vec::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(sessions) => sessions,
        Err(e) => {
            warn!(target: "chatstream::store", "Discarding unreadable session data: {}", e);
            Vec::new()
        }
    }
}

/// A message persisted mid-stream can never resume.
fn recover_interrupted(session: &mut ChatSession) {
    for message in session.messages.iter_mut().filter(|m| m.is_streaming) {
        debug!(target: "chatstream::store", "Marking interrupted message {} as failed", message.id);
        if message.content.is_empty() {
            message.fail(INTERRUPTED_MESSAGE.to_string());
        } else {
            message.complete();
        }
    }
}
