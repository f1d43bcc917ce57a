//! Freezes a reduced message and hands it to downstream collaborators.

use crate::reducer::MessageReducer;
use chatstream_types::ChatMessage;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Receives the clean text of a finished response (e.g. text-to-speech).
pub trait ContentSink: Send + Sync {
    fn deliver(&self, content: &str) -> anyhow::Result<()>;
}

/// Receives the workflow payload of a finished response (e.g. deployment).
pub trait WorkflowSink: Send + Sync {
    fn deliver(&self, payload: &Map<String, Value>) -> anyhow::Result<()>;
}

/// Terminal step of a turn.
#[derive(Default, Clone)]
pub struct Finalizer {
    content_sinks: Vec<Arc<dyn ContentSink>>,
    workflow_sinks: Vec<Arc<dyn WorkflowSink>>,
}

impl std::fmt::Debug for Finalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Finalizer")
            .field("content_sinks", &self.content_sinks.len())
            .field("workflow_sinks", &self.workflow_sinks.len())
            .finish()
    }
}

impl Finalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_content_sink(mut self, sink: Arc<dyn ContentSink>) -> Self {
        self.content_sinks.push(sink);
        self
    }

    pub fn with_workflow_sink(mut self, sink: Arc<dyn WorkflowSink>) -> Self {
        self.workflow_sinks.push(sink);
        self
    }

    /// Detach the message from further mutation. A reducer that has not
    /// reached a terminal phase is completed first. Sink failures are logged
    /// and never prevent finalisation.
    pub fn finalize(&self, mut reducer: MessageReducer) -> ChatMessage {
        reducer.complete();
        let message = reducer.into_message();
        debug!(
            target: "chatstream::finalizer",
            "Finalized message {} (error: {}, activities: {})",
            message.id, message.is_error, message.activities.len()
        );

        if message.is_error {
            return message;
        }

        if !message.content.is_empty() {
            for sink in &self.content_sinks {
                if let Err(e) = sink.deliver(&message.content) {
                    warn!(target: "chatstream::finalizer", "Content hand-off failed for {}: {}", message.id, e);
                }
            }
        }

        if let Some(payload) = &message.workflow_payload {
            for sink in &self.workflow_sinks {
                if let Err(e) = sink.deliver(payload) {
                    warn!(target: "chatstream::finalizer", "Workflow hand-off failed for {}: {}", message.id, e);
                }
            }
        }

        message
    }
}
