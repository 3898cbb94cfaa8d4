//! Request validation.
//!
//! Raw turn requests arrive as loosely-typed JSON. Validation normalizes
//! them into a [`ValidatedTurn`] with defaults applied, or rejects them
//! before any session is opened.

use std::sync::LazyLock;

use ironquill_core::ValidationError;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Maximum user message length, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4000;

/// Session ids are minted by clients in a fixed shape: a date, a time, and
/// a short random suffix, e.g. `session-20260821-143052-a7f3`.
static SESSION_ID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^session-\d{8}-\d{6}-[a-z0-9]{4}$").expect("session id pattern is valid")
});

/// An incoming chat turn request, as posted by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurnRequest {
    /// The user's message for this turn.
    pub message: String,

    /// Whether to retrieve memory context before completing.
    #[serde(default)]
    pub use_memory: bool,

    /// Optional client-minted session id for correlating turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Model override; falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// System prompt override; falls back to the configured default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// When set, the memory event echoes the retrieved context text.
    #[serde(default)]
    pub return_memory: bool,

    /// Marks the turn as a test run: recorded but excluded from usage totals.
    #[serde(default)]
    pub testing_mode: bool,
}

impl ChatTurnRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            use_memory: false,
            session_id: None,
            model: None,
            system_prompt: None,
            return_memory: false,
            testing_mode: false,
        }
    }
}

/// Defaults applied when a request omits optional fields.
#[derive(Debug, Clone)]
pub struct TurnDefaults {
    pub model: String,
    pub system_prompt: String,
}

impl Default for TurnDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}

/// A validated, normalized turn ready to run.
#[derive(Debug, Clone)]
pub struct ValidatedTurn {
    pub message: String,
    pub use_memory: bool,
    pub session_id: Option<String>,
    pub model: String,
    pub system_prompt: String,
    pub return_memory: bool,
    pub testing_mode: bool,
}

/// Validates a raw request and applies defaults.
///
/// `known_models` is the current model registry snapshot. An empty snapshot
/// means the registry has not been populated (provider offline or still
/// warming up), in which case any model name is allowed through rather than
/// failing every request.
pub fn validate(
    request: ChatTurnRequest,
    defaults: &TurnDefaults,
    known_models: &[String],
) -> Result<ValidatedTurn, ValidationError> {
    if request.message.trim().is_empty() {
        return Err(ValidationError::EmptyMessage);
    }

    let length = request.message.chars().count();
    if length > MAX_MESSAGE_CHARS {
        return Err(ValidationError::MessageTooLong {
            length,
            max: MAX_MESSAGE_CHARS,
        });
    }

    if let Some(id) = &request.session_id
        && !SESSION_ID_PATTERN.is_match(id)
    {
        return Err(ValidationError::InvalidSessionId(id.clone()));
    }

    let model = request.model.unwrap_or_else(|| defaults.model.clone());
    if !known_models.is_empty() && !known_models.iter().any(|m| m == &model) {
        return Err(ValidationError::UnknownModel(model));
    }

    Ok(ValidatedTurn {
        message: request.message,
        use_memory: request.use_memory,
        session_id: request.session_id,
        model,
        system_prompt: request
            .system_prompt
            .unwrap_or_else(|| defaults.system_prompt.clone()),
        return_memory: request.return_memory,
        testing_mode: request.testing_mode,
    })
}
