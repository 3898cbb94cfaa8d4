//! Usage finalization.
//!
//! Every completed turn yields exactly one [`UsageRecord`]. When the
//! provider reports real token counts we use them; otherwise counts are
//! estimated from character lengths. Error turns get no estimate at all,
//! so a failed call never inflates usage totals.

use ironquill_core::{Message, TokenUsage};
use ironquill_telemetry::{PricingTable, UsageSource};

use crate::event::StreamEvent;

/// Rough character-to-token ratio used when the provider reports no usage.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimates a token count from a character count. Non-empty text always
/// counts as at least one token.
pub fn estimate_tokens_from_chars(chars: usize) -> u32 {
    chars.div_ceil(CHARS_PER_TOKEN) as u32
}

/// Estimates a token count for a piece of text.
pub fn estimate_tokens(text: &str) -> u32 {
    estimate_tokens_from_chars(text.chars().count())
}

/// Finalized usage for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageRecord {
    pub tokens_in: u32,
    pub tokens_out: u32,
    pub cost_usd: f64,
    pub model: String,
    pub ttft_ms: Option<u64>,
    pub source: UsageSource,
}

impl UsageRecord {
    /// Builds a record from provider-reported token counts.
    pub fn from_provider(
        pricing: &PricingTable,
        model: &str,
        usage: TokenUsage,
        ttft_ms: Option<u64>,
    ) -> Self {
        Self::finalize(
            pricing,
            model,
            usage.tokens_in,
            usage.tokens_out,
            ttft_ms,
            UsageSource::Provider,
        )
    }

    /// Builds a record by estimating token counts from the assembled prompt
    /// and the accumulated output text.
    pub fn estimated(
        pricing: &PricingTable,
        model: &str,
        prompt: &[Message],
        output: &str,
        ttft_ms: Option<u64>,
    ) -> Self {
        Self::finalize(
            pricing,
            model,
            estimate_tokens_from_chars(Message::total_chars(prompt)),
            estimate_tokens(output),
            ttft_ms,
            UsageSource::Estimated,
        )
    }

    fn finalize(
        pricing: &PricingTable,
        model: &str,
        tokens_in: u32,
        tokens_out: u32,
        ttft_ms: Option<u64>,
        source: UsageSource,
    ) -> Self {
        // A broken pricing override can yield NaN or infinity; bill those as zero.
        let raw = pricing.compute_cost(model, tokens_in, tokens_out);
        let cost_usd = if raw.is_finite() { raw.max(0.0) } else { 0.0 };
        Self {
            tokens_in,
            tokens_out,
            cost_usd,
            model: model.to_string(),
            ttft_ms,
            source,
        }
    }

    /// The wire event announcing this record to the client.
    pub fn to_event(&self) -> StreamEvent {
        StreamEvent::Usage {
            tokens_in: self.tokens_in,
            tokens_out: self.tokens_out,
            cost_usd: self.cost_usd,
            model: self.model.clone(),
        }
    }
}
