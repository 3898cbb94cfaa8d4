//! Provider trait — the abstraction over token-generation backends.
//!
//! A Provider knows how to send prompt messages to a model and stream the
//! reply back chunk by chunk. The relay drives this trait without knowing
//! which backend is behind it.
//!
//! Implementations: OpenAI-compatible endpoints, scripted playback for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::message::Message;

/// Configuration for a completion request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// The model to use (e.g., "gpt-4o-mini")
    pub model: String,

    /// The assembled prompt messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
            stop: Vec::new(),
        }
    }
}

fn default_temperature() -> f32 {
    0.7
}

/// Token counts reported (or estimated) for one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub tokens_in: u32,
    pub tokens_out: u32,
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the reply
    Stop,
    /// max_tokens reached
    Length,
    /// Provider-side safety filter cut generation short
    ContentFilter,
    /// The turn ended because of an upstream failure
    Error,
}

impl FinishReason {
    /// The wire string used in the `done` event.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content_filter",
            Self::Error => "error",
        }
    }

    /// Map a provider's finish_reason string. Unknown values collapse to
    /// `Stop`: the reply ended and nothing failed.
    pub fn from_provider(s: &str) -> Self {
        match s {
            "length" | "max_tokens" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "error" => Self::Error,
            _ => Self::Stop,
        }
    }
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single chunk in a streaming completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionChunk {
    /// Partial content delta
    #[serde(default)]
    pub delta: Option<String>,

    /// Why generation stopped (only on the terminal chunk)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,

    /// Usage info, when the provider reports it inline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,

    /// Whether this is the final chunk
    #[serde(default)]
    pub done: bool,
}

impl CompletionChunk {
    /// A content-bearing chunk.
    pub fn delta(text: impl Into<String>) -> Self {
        Self { delta: Some(text.into()), finish_reason: None, usage: None, done: false }
    }

    /// A usage-bearing chunk (no content).
    pub fn usage(tokens_in: u32, tokens_out: u32) -> Self {
        Self {
            delta: None,
            finish_reason: None,
            usage: Some(TokenUsage { tokens_in, tokens_out }),
            done: false,
        }
    }

    /// The terminal chunk.
    pub fn finished(reason: FinishReason) -> Self {
        Self { delta: None, finish_reason: Some(reason), usage: None, done: true }
    }
}

/// A live completion stream handed back by a provider.
///
/// `retries` counts how many times stream establishment was re-attempted
/// before this stream came up; the relay records it for telemetry.
#[derive(Debug)]
pub struct CompletionStream {
    pub chunks: tokio::sync::mpsc::Receiver<std::result::Result<CompletionChunk, ProviderError>>,
    pub retries: u32,
}

impl CompletionStream {
    pub fn new(
        chunks: tokio::sync::mpsc::Receiver<std::result::Result<CompletionChunk, ProviderError>>,
    ) -> Self {
        Self { chunks, retries: 0 }
    }
}

/// The core Provider trait.
///
/// `stream` takes the turn's cancellation token: implementations must observe
/// it at every await point so a client disconnect stops upstream work
/// promptly instead of generating tokens nobody will read.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Start a streaming completion.
    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> std::result::Result<CompletionStream, ProviderError>;

    /// List available models for this provider.
    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(Vec::new())
    }

    /// Health check — can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}
