// crates/core/src/sse.rs
//! Line-buffering parser for `text/event-stream` bodies.
//!
//! Chunk boundaries carry no meaning: a frame may arrive split
//! mid-line or mid-payload. The parser keeps a byte carry-over buffer
//! across [`SseFrameParser::push`] calls, splits on newlines, and
//! holds back the final (possibly partial) line until it terminates.
//! A partial multi-byte UTF-8 sequence at a chunk edge therefore
//! never corrupts: bytes only leave the buffer once their line is
//! complete.

/// One `event:`/`data:`-delimited, blank-line-terminated unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseFrame {
    /// Event name; absent means the protocol default (`message`).
    pub event: Option<String>,
    /// Data lines joined with `\n`.
    pub data: String,
}

/// Incremental SSE frame parser.
#[derive(Debug, Default)]
pub struct SseFrameParser {
    buffer: Vec<u8>,
    pending_event: Option<String>,
    pending_data: Vec<String>,
    has_data: bool,
    finished: bool,
}

impl SseFrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk; returns every frame completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();
        self.buffer.extend_from_slice(chunk);

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = self.buffer.drain(..=pos).collect();
            // Strip the \n (and a preceding \r — SSE allows CRLF).
            let mut end = line_bytes.len() - 1;
            if end > 0 && line_bytes[end - 1] == b'\r' {
                end -= 1;
            }
            let line = String::from_utf8_lossy(&line_bytes[..end]).into_owned();
            self.handle_line(&line, &mut frames);
        }

        frames
    }

    /// Flush the trailing unterminated line and any partially
    /// accumulated frame. Call exactly once after stream end;
    /// subsequent calls are no-ops.
    pub fn finish(&mut self) -> Vec<SseFrame> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;

        let mut frames = Vec::new();
        if !self.buffer.is_empty() {
            let rest = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&rest).into_owned();
            self.handle_line(line.trim_end_matches('\r'), &mut frames);
        }
        if let Some(frame) = self.flush() {
            frames.push(frame);
        }
        frames
    }

    fn handle_line(&mut self, line: &str, frames: &mut Vec<SseFrame>) {
        if line.is_empty() {
            // Frame terminator.
            if let Some(frame) = self.flush() {
                frames.push(frame);
            }
        } else if line.starts_with(':') {
            // Comment / keepalive.
        } else if let Some(value) = line.strip_prefix("event:") {
            self.pending_event = Some(field_value(value).to_string());
        } else if let Some(value) = line.strip_prefix("data:") {
            self.pending_data.push(field_value(value).to_string());
            self.has_data = true;
        }
        // Other field names (id:, retry:, ...) are tolerated, unused.
    }

    fn flush(&mut self) -> Option<SseFrame> {
        if self.pending_event.is_none() && !self.has_data {
            // Keepalive ping: nothing accumulated.
            return None;
        }
        let frame = SseFrame {
            event: self.pending_event.take(),
            data: std::mem::take(&mut self.pending_data).join("\n"),
        };
        self.has_data = false;
        Some(frame)
    }
}

/// Field values keep everything after the colon, minus at most one
/// leading space.
fn field_value(value: &str) -> &str {
    value.strip_prefix(' ').unwrap_or(value)
}
