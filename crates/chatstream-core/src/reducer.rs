//! Folds stream events into the in-flight assistant message.
//!
//! State machine per message:
//! `Idle -> Streaming -> {Completed | Errored}`. Terminal phases reject every
//! further event.

use crate::activity::ActivityTimeline;
use crate::error::TransportError;
use crate::tags::{self, ExtractMode};
use chatstream_types::{Activity, ChatMessage, MessageUpdate, StreamEvent};
use chrono::Utc;
use tracing::{debug, trace, warn};

/// Lifecycle phase of the message being reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// No event applied yet
    Idle,
    Streaming,
    Completed,
    Errored,
}

impl StreamPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamPhase::Completed | StreamPhase::Errored)
    }
}

/// Per-stream consumption state. Never shared between streams.
#[derive(Debug, Clone)]
pub struct StreamContext {
    /// Concatenation of every text event, tags included
    raw: String,
    timeline: ActivityTimeline,
    phase: StreamPhase,
}

impl Default for StreamContext {
    fn default() -> Self {
        Self {
            raw: String::new(),
            timeline: ActivityTimeline::new(),
            phase: StreamPhase::Idle,
        }
    }
}

/// Reducer for one assistant message.
#[derive(Debug, Clone)]
pub struct MessageReducer {
    message: ChatMessage,
    ctx: StreamContext,
}

impl MessageReducer {
    pub fn new(mut message: ChatMessage) -> Self {
        message.is_streaming = true;
        message.is_error = false;
        Self {
            message,
            ctx: StreamContext::default(),
        }
    }

    pub fn message(&self) -> &ChatMessage {
        &self.message
    }

    pub fn phase(&self) -> StreamPhase {
        self.ctx.phase
    }

    pub fn is_terminal(&self) -> bool {
        self.ctx.phase.is_terminal()
    }

    /// Raw text buffer before tag extraction.
    pub fn raw_text(&self) -> &str {
        &self.ctx.raw
    }

    /// Activity currently receiving tool events, for live progress display.
    pub fn current_activity(&self) -> Option<&Activity> {
        self.ctx.timeline.current(&self.message.activities)
    }

    /// Apply one event. Returns the resulting change, if any.
    pub fn apply(&mut self, event: StreamEvent) -> Option<MessageUpdate> {
        if self.is_terminal() {
            trace!(
                target: "chatstream::reducer",
                "Ignoring {} event after terminal phase {:?}", event.kind(), self.ctx.phase
            );
            return None;
        }
        self.ctx.phase = StreamPhase::Streaming;

        let message_id = self.message.id.clone();
        match event {
            StreamEvent::Text(delta) => {
                self.ctx.raw.push_str(&delta);
                self.refresh_content(ExtractMode::Streaming)
            }
            StreamEvent::Workflow(payload) => {
                if self.message.workflow_payload.is_some() {
                    debug!(target: "chatstream::reducer", "Replacing earlier workflow payload on {}", message_id);
                }
                self.message.workflow_payload = Some(payload.clone());
                Some(MessageUpdate::WorkflowSet { message_id, payload })
            }
            StreamEvent::ToolStart { tool } => {
                let activity = self
                    .ctx
                    .timeline
                    .start(&mut self.message.activities, tool, Utc::now())
                    .clone();
                Some(MessageUpdate::ActivityStarted { message_id, activity })
            }
            StreamEvent::ToolInput(input) => self
                .ctx
                .timeline
                .record_input(&mut self.message.activities, &input)
                .map(|a| MessageUpdate::ActivityUpdated {
                    message_id,
                    activity: a.clone(),
                }),
            StreamEvent::ToolResult { tool, result } => self
                .ctx
                .timeline
                .finish(&mut self.message.activities, tool, &result, Utc::now())
                .map(|a| MessageUpdate::ActivityFinished {
                    message_id,
                    activity: a.clone(),
                }),
            StreamEvent::Error(reason) => {
                warn!(target: "chatstream::reducer", "Stream reported an error: {}", reason);
                self.fail(protocol_error_message(&reason));
                None
            }
        }
    }

    /// Normal end of stream: the decoder ran dry without an error event.
    pub fn complete(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.refresh_content(ExtractMode::Final);
        self.message.complete();
        self.ctx.phase = StreamPhase::Completed;
    }

    /// The stream could not be opened at all.
    pub fn fail_transport(&mut self, error: &TransportError) {
        if self.is_terminal() {
            return;
        }
        self.fail(transport_error_message(error));
    }

    /// Give up the message, consuming the reducer.
    pub fn into_message(self) -> ChatMessage {
        self.message
    }

    fn fail(&mut self, content: String) {
        self.message.fail(content);
        self.ctx.phase = StreamPhase::Errored;
    }

    fn refresh_content(&mut self, mode: ExtractMode) -> Option<MessageUpdate> {
        let extraction = tags::extract(&self.ctx.raw, mode);
        if extraction.content == self.message.content
            && extraction.metadata == self.message.search_metadata
        {
            return None;
        }
        self.message.content = extraction.content;
        self.message.search_metadata = extraction.metadata;
        Some(MessageUpdate::ContentChanged {
            message_id: self.message.id.clone(),
            content: self.message.content.clone(),
            search_metadata: self.message.search_metadata.clone(),
        })
    }
}

/// Friendly text shown when the server reports an error mid-stream.
pub fn protocol_error_message(reason: &str) -> String {
    format!(
        "Sorry, I ran into a problem while generating a response: {}. Please try again.",
        reason.trim_end_matches('.')
    )
}

/// Friendly text shown when the response stream could not be opened.
pub fn transport_error_message(error: &TransportError) -> String {
    match error {
        TransportError::Status(status) => format!(
            "Sorry, the assistant is unavailable right now (status {}). Please try again.",
            status
        ),
        TransportError::ContentType(_) => {
            "Sorry, the assistant sent an unexpected response. Please try again.".to_string()
        }
        TransportError::Network(_) => {
            "Sorry, I couldn't reach the assistant. Check your connection and try again.".to_string()
        }
    }
}
