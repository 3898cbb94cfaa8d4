//! Data model for per-turn usage records and aggregate summaries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ── Usage source ──────────────────────────────────────────────────────────

/// Where the token counts of a turn came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UsageSource {
    /// Reported inline by the upstream provider.
    Provider,
    /// Derived locally from character counts.
    Estimated,
}

impl UsageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider => "provider",
            Self::Estimated => "estimated",
        }
    }
}

impl std::fmt::Display for UsageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Turn record ───────────────────────────────────────────────────────────

/// One completed chat turn, recorded when its stream closes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnRecord {
    /// Unique record id.
    pub id: String,
    /// Client session this turn belonged to, when one was supplied.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Model that served the turn.
    pub model: String,
    /// Input tokens consumed.
    pub tokens_in: u32,
    /// Output tokens produced.
    pub tokens_out: u32,
    /// Computed cost in USD.
    pub cost_usd: f64,
    /// None when the turn errored before any usage was settled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage_source: Option<UsageSource>,
    /// Milliseconds from request start to the first streamed token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttft_ms: Option<u64>,
    /// Milliseconds spent in memory retrieval, when it ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_ms: Option<u64>,
    /// Upstream retries before the first token.
    #[serde(default)]
    pub retries: u32,
    /// Terminal finish reason ("stop", "length", "content_filter", "error").
    pub finish_reason: String,
    /// Turn was flagged as a test run; excluded from cost aggregates.
    #[serde(default)]
    pub testing: bool,
    /// When the turn started.
    pub started_at: DateTime<Utc>,
    /// When the turn finished.
    pub ended_at: DateTime<Utc>,
}

impl TurnRecord {
    /// Create a record with a fresh id and both timestamps set to now.
    /// Callers fill in token counts and timings before recording.
    pub fn new(model: impl Into<String>, finish_reason: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: None,
            model: model.into(),
            tokens_in: 0,
            tokens_out: 0,
            cost_usd: 0.0,
            usage_source: None,
            ttft_ms: None,
            memory_ms: None,
            retries: 0,
            finish_reason: finish_reason.into(),
            testing: false,
            started_at: now,
            ended_at: now,
        }
    }

    /// Total tokens (input + output).
    pub fn total_tokens(&self) -> u32 {
        self.tokens_in + self.tokens_out
    }

    /// Wall-clock duration of the turn in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.ended_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Whether the turn terminated with an error.
    pub fn is_error(&self) -> bool {
        self.finish_reason == "error"
    }
}

// ── Aggregated view ───────────────────────────────────────────────────────

/// A point-in-time usage summary (for the /v1/usage endpoint).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UsageSnapshot {
    /// Turns counted toward aggregates (testing turns excluded).
    pub total_turns: u64,
    /// Counted turns that terminated with an error.
    pub error_turns: u64,
    /// Turns flagged as test runs, tracked but never aggregated.
    pub testing_turns: u64,
    /// Total input tokens across counted turns.
    pub total_tokens_in: u64,
    /// Total output tokens across counted turns.
    pub total_tokens_out: u64,
    /// Total cost in USD across counted turns.
    pub total_cost_usd: f64,
    /// Counted turns whose usage came from the provider.
    pub provider_usage_turns: u64,
    /// Counted turns whose usage was estimated locally.
    pub estimated_usage_turns: u64,
    /// Mean time-to-first-token across counted turns that saw a token.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avg_ttft_ms: Option<f64>,
    /// Records currently held in the in-memory ring.
    pub recorded_turns: usize,
}

impl UsageSnapshot {
    /// Total tokens in both directions.
    pub fn total_tokens(&self) -> u64 {
        self.total_tokens_in + self.total_tokens_out
    }
}
