//! Decoder for `data: <json>` framed event streams.
//!
//! Bytes arrive in arbitrary read chunks. Only newline-terminated lines are
//! decoded; the trailing partial line is held back until the next read.

use futures::Stream;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, trace, warn};

/// Prefix that marks a frame line.
pub const FRAME_PREFIX: &str = "data: ";

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Incremental line decoder for the event stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    /// Bytes after the last newline seen so far.
    pending: Vec<u8>,
    /// Number of frame lines dropped because their JSON was malformed.
    malformed: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return the JSON bodies of every frame the
    /// chunk completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Value> {
        self.pending.extend_from_slice(chunk);

        // A newline byte never occurs inside a multi-byte UTF-8 sequence, so
        // everything up to the last newline decodes on its own.
        let Some(last_newline) = self.pending.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };
        let rest = self.pending.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.pending, rest);
        let text = String::from_utf8_lossy(&complete);

        text.split('\n')
            .filter_map(|line| self.parse_line(line))
            .collect()
    }

    /// Parse one complete line. Returns `None` for non-frame lines and for
    /// frames whose body is not valid JSON.
    pub fn parse_line(&mut self, line: &str) -> Option<Value> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        let Some(body) = line.strip_prefix(FRAME_PREFIX) else {
            if !line.is_empty() {
                trace!(target: "chatstream::decoder", "Ignoring non-frame line: {}", line);
            }
            return None;
        };

        match serde_json::from_str::<Value>(body) {
            Ok(value) => Some(value),
            Err(e) => {
                // Malformed frames are skipped, never fatal
                self.malformed += 1;
                warn!(target: "chatstream::decoder", "Skipping malformed frame: {}: {}", e, body);
                None
            }
        }
    }

    /// Signal end of input. An unterminated trailing line is discarded.
    pub fn finish(&mut self) {
        if !self.pending.is_empty() {
            debug!(
                target: "chatstream::decoder",
                "Discarding {} bytes of unterminated input at end of stream",
                self.pending.len()
            );
            self.pending.clear();
        }
    }

    pub fn malformed_count(&self) -> usize {
        self.malformed
    }
}

/// Turn a byte reader into an async sequence of frame bodies.
///
/// The next read is only issued once every frame from the previous read has
/// been consumed. The sequence ends at end of input or on the first read
/// error, which is yielded as the final item.
pub fn frames<R>(reader: R) -> impl Stream<Item = std::io::Result<Value>>
where
    R: AsyncRead + Unpin,
{
    struct State<R> {
        reader: R,
        decoder: FrameDecoder,
        ready: std::collections::VecDeque<Value>,
        buf: Vec<u8>,
        done: bool,
    }

    let state = State {
        reader,
        decoder: FrameDecoder::new(),
        ready: std::collections::VecDeque::new(),
        buf: vec![0u8; READ_CHUNK_SIZE],
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(value) = state.ready.pop_front() {
                return Some((Ok(value), state));
            }
            if state.done {
                return None;
            }

            match state.reader.read(&mut state.buf).await {
                Ok(0) => {
                    state.decoder.finish();
                    state.done = true;
                }
                Ok(n) => state.ready.extend(state.decoder.push(&state.buf[..n])),
                Err(e) => {
                    state.done = true;
                    return Some((Err(e), state));
                }
            }
        }
    })
}
