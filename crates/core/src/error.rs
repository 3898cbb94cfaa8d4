//! Error types for the IronQuill domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all IronQuill operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Validation errors (pre-stream, reported as HTTP 400) ---
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Memory errors ---
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    // --- Session errors ---
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Rejections produced by the request validator. Each carries a stable
/// machine-readable code so the gateway can serve `{"error", "code"}` bodies.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Message must not be empty")]
    EmptyMessage,

    #[error("Message too long: {length} chars (max {max})")]
    MessageTooLong { length: usize, max: usize },

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),
}

impl ValidationError {
    /// Stable error code for the HTTP 400 response body.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyMessage => "empty_message",
            Self::MessageTooLong { .. } => "message_too_long",
            Self::InvalidSessionId(_) => "invalid_session_id",
            Self::UnknownModel(_) => "unknown_model",
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),
}

impl ProviderError {
    /// Whether the failure is worth retrying at stream establishment.
    ///
    /// Auth and model errors are permanent; rate limits, server errors,
    /// timeouts and network hiccups are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum MemoryError {
    #[error("Memory service unavailable: {0}")]
    Unavailable(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Invalid response from memory service: {0}")]
    InvalidResponse(String),
}

/// Misuse of the streaming session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Session already opened")]
    AlreadyOpened,

    #[error("Session already closed")]
    Closed,
}
