//! Stream events and wire frames.
//!
//! A [`StreamEvent`] is a semantic event produced while running a chat turn.
//! Each event maps onto one SSE record: an `event:` name line plus a JSON
//! `data:` payload. The payload shapes are part of the public wire contract,
//! so they are fixed here rather than derived from internal struct layout.

use ironquill_core::FinishReason;
use serde_json::{Value, json};

/// A semantic event emitted during a streaming chat turn.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Memory context was retrieved before the completion started.
    ///
    /// `results` carries the retrieved context text only when the client
    /// asked for it; `memory_ms` is always present.
    Memory {
        results: Option<String>,
        memory_ms: u64,
    },
    /// An incremental piece of assistant output.
    Token { text: String },
    /// Final token counts and cost for the turn. Emitted at most once.
    Usage {
        tokens_in: u32,
        tokens_out: u32,
        cost_usd: f64,
        model: String,
    },
    /// Terminal event. Nothing follows except the legacy end marker.
    Done { finish_reason: FinishReason },
    /// A machine-readable error notice, sent before `Done` on failures.
    Error { message: String, code: String },
}

impl StreamEvent {
    /// The SSE `event:` name for this event.
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Memory { .. } => "memory",
            Self::Token { .. } => "token",
            Self::Usage { .. } => "usage",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// The JSON `data:` payload for this event.
    ///
    /// Field names here are wire-stable: `memoryMs` is camelCase for
    /// historical compatibility, the usage fields are snake_case.
    pub fn payload(&self) -> Value {
        match self {
            Self::Memory { results, memory_ms } => json!({
                "results": results,
                "memoryMs": memory_ms,
            }),
            Self::Token { text } => json!({ "text": text }),
            Self::Usage {
                tokens_in,
                tokens_out,
                cost_usd,
                model,
            } => json!({
                "tokens_in": tokens_in,
                "tokens_out": tokens_out,
                "cost_usd": cost_usd,
                "model": model,
            }),
            Self::Done { finish_reason } => json!({ "finish_reason": finish_reason.as_str() }),
            Self::Error { message, code } => json!({
                "error": message,
                "code": code,
            }),
        }
    }

    /// Whether this event ends the turn.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. })
    }
}

/// One frame queued to the HTTP transport.
///
/// The session layer works in frames so it stays independent of the web
/// framework; the gateway maps each variant onto its SSE rendering.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// A named event record: `event: <name>` + `data: <json>`.
    Event { name: &'static str, data: String },
    /// A bare `data:` record with no event name (the legacy end marker).
    Data(String),
    /// A comment line, ignored by SSE clients (heartbeats).
    Comment(String),
}

impl From<&StreamEvent> for Frame {
    fn from(event: &StreamEvent) -> Self {
        Frame::Event {
            name: event.event_name(),
            data: event.payload().to_string(),
        }
    }
}
