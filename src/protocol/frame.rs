//! Incremental frame decoder
//!
//! Turns arbitrary byte chunks into complete [`StreamEvent`]s. Bytes are
//! buffered undecoded until a full line is available, so a multi-byte
//! character split across two chunks is reassembled before UTF-8 decoding.

use super::StreamEvent;

/// Prefix marking an event line. Anything else is a keep-alive or comment.
pub const EVENT_PREFIX: &str = "data:";

const RECORD_SEPARATOR: u8 = b'\n';

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to hold no separator
    scanned: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return every event completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buf.extend_from_slice(chunk);

        let mut events = Vec::new();
        let mut line_start = 0;
        let mut cursor = self.scanned;

        while let Some(offset) = self.buf[cursor..]
            .iter()
            .position(|&b| b == RECORD_SEPARATOR)
        {
            let line_end = cursor + offset;
            if let Some(event) = decode_line(&self.buf[line_start..line_end]) {
                events.push(event);
            }
            line_start = line_end + 1;
            cursor = line_start;
        }

        self.buf.drain(..line_start);
        self.scanned = self.buf.len();
        events
    }

    pub fn has_residual(&self) -> bool {
        !self.buf.is_empty()
    }

    /// End of stream. An unterminated trailing line is never parsed; returns
    /// how many bytes were dropped.
    pub fn finish(self) -> usize {
        let dropped = self.buf.len();
        if self.buf.iter().any(|b| !b.is_ascii_whitespace()) {
            tracing::warn!(
                dropped_bytes = dropped,
                "Stream ended inside an unterminated frame"
            );
        }
        dropped
    }

    /// Decode a complete body in one go
    pub fn decode_all(bytes: &[u8]) -> Vec<StreamEvent> {
        let mut decoder = Self::new();
        let events = decoder.feed(bytes);
        decoder.finish();
        events
    }
}

fn decode_line(raw: &[u8]) -> Option<StreamEvent> {
    let line = String::from_utf8_lossy(raw);
    let payload = line.trim().strip_prefix(EVENT_PREFIX)?.trim();

    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            tracing::debug!(error = %e, payload = %payload, "Skipping malformed frame");
            None
        }
    }
}
