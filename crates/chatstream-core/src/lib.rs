//! Stream reconstruction for chatstream.
//!
//! Pipeline: `decoder` turns bytes into frames, `classifier` turns frames into
//! `StreamEvent`s, `reducer` folds events into a `ChatMessage` (using `tags`
//! and `activity`), `finalizer` freezes it and `session` persists it.

pub mod activity;
pub mod classifier;
pub mod decoder;
mod error;
pub mod finalizer;
pub mod reducer;
pub mod session;
pub mod store;
pub mod tags;
pub mod transport;
pub mod turn;

pub use activity::{ActivityFeed, ActivityTimeline, MAX_FEED_ACTIVITIES};
pub use classifier::classify;
pub use decoder::{FrameDecoder, frames};
pub use error::{ChatStreamError, TransportError};
pub use finalizer::{ContentSink, Finalizer, WorkflowSink};
pub use reducer::{MessageReducer, StreamContext, StreamPhase};
pub use session::{PendingTurn, SessionManager, SessionManagerConfig};
pub use store::{KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore};
pub use tags::{ExtractMode, Extraction, extract};
pub use transport::{ReplayTransport, Transport, TransportResponse, TurnRequest};
pub use turn::{TurnInput, TurnRunner};

/// Result type for chatstream operations.
pub type Result<T> = std::result::Result<T, ChatStreamError>;
