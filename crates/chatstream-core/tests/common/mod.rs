//! Common test utilities for integration tests.

#![allow(dead_code)]

use chatstream_core::{
    KeyValueStore, MemoryKeyValueStore, SessionManager, SessionManagerConfig, Transport,
    TransportResponse, TurnRequest, TransportError,
};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};

/// Load a captured event stream from the fixtures directory.
pub fn load_stream_fixture(name: &str) -> Vec<u8> {
    let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("streams")
        .join(format!("{}.sse", name));

    std::fs::read(&fixture_path)
        .unwrap_or_else(|e| panic!("Failed to read fixture {}: {}", fixture_path.display(), e))
}

/// Encode frame bodies the way the server does.
pub fn sse(frames: &[serde_json::Value]) -> Vec<u8> {
    frames
        .iter()
        .flat_map(|f| format!("data: {}\n\n", f).into_bytes())
        .collect()
}

/// Split bytes into chunks of `size`, ignoring frame and character boundaries.
pub fn rechunk(bytes: &[u8], size: usize) -> Vec<Vec<u8>> {
    bytes.chunks(size.max(1)).map(<[u8]>::to_vec).collect()
}

/// Reader that hands out one chunk per read call and records how many reads
/// were served.
pub struct ChunkReader {
    chunks: VecDeque<Vec<u8>>,
    reads: Arc<Mutex<usize>>,
    stall: bool,
}

impl AsyncRead for ChunkReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if let Some(mut chunk) = self.chunks.pop_front() {
            let n = chunk.len().min(buf.remaining());
            buf.put_slice(&chunk[..n]);
            if n < chunk.len() {
                let rest = chunk.split_off(n);
                self.chunks.push_front(rest);
            }
            *self.reads.lock().unwrap() += 1;
        } else if self.stall {
            return Poll::Pending;
        }
        Poll::Ready(Ok(()))
    }
}

/// Transport that serves pre-split chunks, or fails with a status code.
pub struct ScriptedTransport {
    chunks: Vec<Vec<u8>>,
    status: u16,
    content_type: String,
    stall: bool,
    pub reads: Arc<Mutex<usize>>,
    pub requests: Arc<Mutex<Vec<TurnRequest>>>,
}

impl ScriptedTransport {
    pub fn new(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks,
            status: 200,
            content_type: "text/event-stream".to_string(),
            stall: false,
            reads: Arc::new(Mutex::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            status,
            ..Self::new(Vec::new())
        }
    }

    /// Never end the body: once the chunks are served, reads hang like a
    /// connection that went quiet.
    pub fn stalling(mut self) -> Self {
        self.stall = true;
        self
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }
}

impl Transport for ScriptedTransport {
    async fn open(&self, request: &TurnRequest) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(TransportResponse {
            status: self.status,
            content_type: Some(self.content_type.clone()),
            body: Box::new(ChunkReader {
                chunks: self.chunks.clone().into(),
                reads: self.reads.clone(),
                stall: self.stall,
            }),
        })
    }
}

/// Session manager over an in-memory store.
pub fn memory_sessions() -> (SessionManager, Arc<dyn KeyValueStore>) {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
    let sessions = SessionManager::load(store.clone(), SessionManagerConfig::default());
    (sessions, store)
}
