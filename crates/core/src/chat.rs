// crates/core/src/chat.rs
//! Typed chat-stream events and transcript assembly.
//!
//! [`ChatEvent::decode`] turns raw SSE frames into a discriminated
//! union; [`TranscriptAssembler`] folds the event sequence into an
//! ordered transcript. Token deltas accumulate in a transient buffer
//! that a `done` frame freezes into one immutable assistant entry;
//! every other entry is immutable from the moment it is appended.

use serde::{Deserialize, Serialize};

use crate::sse::SseFrame;

/// Generic failure text shown for both protocol-level `error` frames
/// and transport failures — the UI deliberately cannot tell them
/// apart.
pub const STREAM_FAILURE_MESSAGE: &str =
    "Something went wrong while generating a response. Please try again.";

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct TokenPayload {
    delta: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepPayload {
    pub title: String,
    #[serde(default)]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallPayload {
    pub tool: String,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResultPayload {
    pub tool: String,
    #[serde(default)]
    pub summary: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextSourcePayload {
    pub source: String,
    pub status: String,
    #[serde(default)]
    pub count: Option<u64>,
}

/// A parsed unit from the chat event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    /// Streaming text delta; accumulates, does not yet commit an entry.
    Token { delta: String },
    Step(StepPayload),
    ToolCall(ToolCallPayload),
    ToolResult(ToolResultPayload),
    ContextSource(ContextSourcePayload),
    /// Terminal: freeze the transient buffer into an assistant entry.
    Done,
    /// Terminal application-level failure.
    Error,
    /// Unrecognized event name — tolerated, carried verbatim.
    Message { data: String },
}

impl ChatEvent {
    /// Decode one frame. Malformed JSON payloads are logged and
    /// dropped (`None`) rather than aborting the stream.
    pub fn decode(frame: &SseFrame) -> Option<ChatEvent> {
        let name = frame.event.as_deref().unwrap_or("message");
        match name {
            "token" => decode_payload::<TokenPayload>(name, &frame.data)
                .map(|p| ChatEvent::Token { delta: p.delta }),
            "step" => decode_payload(name, &frame.data).map(ChatEvent::Step),
            "tool_call" => decode_payload(name, &frame.data).map(ChatEvent::ToolCall),
            "tool_result" => decode_payload(name, &frame.data).map(ChatEvent::ToolResult),
            "context_source" => decode_payload(name, &frame.data).map(ChatEvent::ContextSource),
            "done" => Some(ChatEvent::Done),
            "error" => Some(ChatEvent::Error),
            _ => Some(ChatEvent::Message {
                data: frame.data.clone(),
            }),
        }
    }
}

fn decode_payload<T: serde::de::DeserializeOwned>(event: &str, data: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(payload) => Some(payload),
        Err(e) => {
            tracing::warn!(event, error = %e, "dropping malformed chat event payload");
            None
        }
    }
}

/// One entry of the ordered message transcript. Never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TranscriptEntry {
    Assistant { content: String },
    Step(StepPayload),
    ToolCall(ToolCallPayload),
    ToolResult(ToolResultPayload),
    ContextSource(ContextSourcePayload),
    Failure { content: String },
}

/// Folds a chat event sequence into a transcript plus the running
/// transient text buffer.
#[derive(Debug, Default)]
pub struct TranscriptAssembler {
    entries: Vec<TranscriptEntry>,
    pending: String,
}

impl TranscriptAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::Token { delta } => self.pending.push_str(&delta),
            ChatEvent::Step(p) => self.entries.push(TranscriptEntry::Step(p)),
            ChatEvent::ToolCall(p) => self.entries.push(TranscriptEntry::ToolCall(p)),
            ChatEvent::ToolResult(p) => self.entries.push(TranscriptEntry::ToolResult(p)),
            ChatEvent::ContextSource(p) => self.entries.push(TranscriptEntry::ContextSource(p)),
            ChatEvent::Done => {
                if !self.pending.is_empty() {
                    let content = std::mem::take(&mut self.pending);
                    self.entries.push(TranscriptEntry::Assistant { content });
                }
            }
            ChatEvent::Error => self.fail(),
            ChatEvent::Message { data } => {
                tracing::debug!(%data, "ignoring unrecognized chat event");
            }
        }
    }

    /// Record a generic failure entry and discard any partial text.
    /// Used for both `error` frames and transport failures.
    pub fn fail(&mut self) {
        self.pending.clear();
        self.entries.push(TranscriptEntry::Failure {
            content: STREAM_FAILURE_MESSAGE.to_string(),
        });
    }

    /// The in-flight (not yet frozen) assistant text.
    pub fn pending_text(&self) -> &str {
        &self.pending
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<TranscriptEntry> {
        self.entries
    }
}
