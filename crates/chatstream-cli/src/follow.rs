//! Live progress output for `replay --follow`.

use crate::render;
use chatstream_types::MessageUpdate;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

/// Print each update to stderr until the sending runner is dropped.
pub fn spawn(receiver: broadcast::Receiver<MessageUpdate>) -> JoinHandle<()> {
    let mut updates = BroadcastStream::new(receiver);
    tokio::spawn(async move {
        while let Some(update) = updates.next().await {
            match update {
                Ok(update) => eprintln!("> {}", render::update(&update)),
                Err(e) => eprintln!("> {}", e),
            }
        }
    })
}

/// Wait for the printer to drain. A failed printer only loses progress lines.
pub async fn finish(handle: JoinHandle<()>) {
    if let Err(e) = handle.await {
        debug!(target: "chatstream::startup", "Progress printer ended abnormally: {}", e);
    }
}
