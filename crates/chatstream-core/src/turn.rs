//! Drives one user turn from transport to a persisted, finalized message.

use crate::classifier::classify;
use crate::decoder::frames;
use crate::error::TransportError;
use crate::finalizer::Finalizer;
use crate::reducer::MessageReducer;
use crate::session::SessionManager;
use crate::transport::{ResponseBody, Transport, TurnRequest};
use crate::Result;
use chatstream_types::{ChatMessage, MessageUpdate};
use futures::StreamExt;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Capacity of the live update channel.
pub const UPDATE_CHANNEL_CAPACITY: usize = 256;

/// What the user submitted.
#[derive(Debug, Clone, Default)]
pub struct TurnInput {
    pub message: String,
    pub selected_context: Option<String>,
    pub action: Option<String>,
}

impl TurnInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// Runs turns against a transport.
pub struct TurnRunner<T> {
    transport: T,
    finalizer: Finalizer,
    updates: broadcast::Sender<MessageUpdate>,
}

impl<T: Transport> TurnRunner<T> {
    pub fn new(transport: T) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            transport,
            finalizer: Finalizer::new(),
            updates,
        }
    }

    pub fn with_finalizer(mut self, finalizer: Finalizer) -> Self {
        self.finalizer = finalizer;
        self
    }

    /// Subscribe to live message updates, delivered in event order.
    pub fn subscribe(&self) -> broadcast::Receiver<MessageUpdate> {
        self.updates.subscribe()
    }

    /// Submit a user turn in the current session and consume the response.
    ///
    /// Transport and protocol failures end up in the returned message
    /// (`is_error`), not in `Err`. `Err` means the turn was never accepted.
    pub async fn run(&self, sessions: &mut SessionManager, input: TurnInput) -> Result<ChatMessage> {
        let turn = sessions.begin_turn(&input.message, input.selected_context, input.action)?;
        info!(
            target: "chatstream::turn",
            "Starting turn in session {} ({} history entries)",
            turn.session_id, turn.request.chat_history.len()
        );

        let mut reducer = MessageReducer::new(turn.message);
        match self.open(&turn.request).await {
            Ok(body) => self.consume(body, &mut reducer, sessions).await,
            Err(e) => {
                warn!(target: "chatstream::turn", "Transport failed before streaming: {}", e);
                reducer.fail_transport(&e);
            }
        }

        let message = self.finalizer.finalize(reducer);
        sessions.commit_message(message.clone())?;
        self.publish(MessageUpdate::Finalized {
            message: message.clone(),
        });

        info!(
            target: "chatstream::turn",
            "Turn finished in session {} (error: {}, {} chars, {} activities)",
            turn.session_id,
            message.is_error,
            message.content.chars().count(),
            message.activities.len()
        );
        Ok(message)
    }

    async fn open(&self, request: &TurnRequest) -> std::result::Result<ResponseBody, TransportError> {
        self.transport.open(request).await?.into_body()
    }

    /// Reduce frames until the stream ends or a terminal event arrives.
    async fn consume(
        &self,
        body: ResponseBody,
        reducer: &mut MessageReducer,
        sessions: &mut SessionManager,
    ) {
        let stream = frames(body);
        futures::pin_mut!(stream);

        while let Some(item) = stream.next().await {
            let value = match item {
                Ok(value) => value,
                Err(e) => {
                    warn!(target: "chatstream::turn", "Stream read failed: {}", e);
                    reducer.fail_transport(&TransportError::Network(e));
                    return;
                }
            };

            let Some(event) = classify(value) else {
                continue;
            };
            let terminal = event.is_terminal();
            if let Some(update) = reducer.apply(event) {
                if let MessageUpdate::ActivityStarted { activity, .. }
                | MessageUpdate::ActivityUpdated { activity, .. }
                | MessageUpdate::ActivityFinished { activity, .. } = &update
                {
                    sessions.record_activity(activity);
                }
                // Write through so a crash mid-stream keeps what arrived so far
                if let Err(e) = sessions.commit_message(reducer.message().clone()) {
                    warn!(target: "chatstream::turn", "Failed to save streaming message: {}", e);
                }
                self.publish(update);
            }
            if terminal {
                debug!(target: "chatstream::turn", "Terminal event received, dropping remaining input");
                return;
            }
        }
    }

    fn publish(&self, update: MessageUpdate) {
        // No subscribers is fine
        let _ = self.updates.send(update);
    }
}
