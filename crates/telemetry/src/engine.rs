//! Thread-safe telemetry engine — records completed turns, tracks running
//! usage totals, and serves snapshots.
//!
//! Recording is infallible from the caller's perspective: poisoned locks are
//! recovered and nothing here can fail a live stream.

use crate::model::{TurnRecord, UsageSnapshot, UsageSource};
use crate::pricing::PricingTable;
use std::collections::VecDeque;
use std::sync::RwLock;

/// Default number of turn records kept in the in-memory ring.
const DEFAULT_RETAIN: usize = 256;

/// The core telemetry engine.
///
/// Thread-safe via `RwLock`. Holds a bounded ring of recent turn records and
/// running totals, and owns the pricing table used for cost computation.
pub struct TelemetryEngine {
    /// Pricing table for cost computation.
    pricing: PricingTable,
    /// Recent turns, oldest first, pruned to `retain`.
    turns: RwLock<VecDeque<TurnRecord>>,
    /// Running totals.
    totals: RwLock<RunningTotals>,
    /// Ring capacity.
    retain: usize,
}

/// Internal running totals for fast snapshot reads.
#[derive(Debug, Default)]
struct RunningTotals {
    /// Turns counted toward aggregates.
    counted_turns: u64,
    /// Counted turns that ended in error.
    error_turns: u64,
    /// Turns flagged as test runs.
    testing_turns: u64,
    /// Total input tokens.
    tokens_in: u64,
    /// Total output tokens.
    tokens_out: u64,
    /// Total cost in USD.
    cost_usd: f64,
    /// Counted turns with provider-reported usage.
    provider_turns: u64,
    /// Counted turns with locally estimated usage.
    estimated_turns: u64,
    /// Sum of observed time-to-first-token values.
    ttft_sum_ms: u64,
    /// Number of turns contributing to the TTFT sum.
    ttft_samples: u64,
}

impl TelemetryEngine {
    /// Create an engine with built-in pricing and default retention.
    pub fn new() -> Self {
        Self::with_pricing(PricingTable::with_defaults())
    }

    /// Create an engine with a custom pricing table.
    pub fn with_pricing(pricing: PricingTable) -> Self {
        Self {
            pricing,
            turns: RwLock::new(VecDeque::new()),
            totals: RwLock::new(RunningTotals::default()),
            retain: DEFAULT_RETAIN,
        }
    }

    /// Set how many turn records the ring keeps.
    pub fn with_retention(mut self, retain: usize) -> Self {
        self.retain = retain.max(1);
        self
    }

    /// Get a reference to the pricing table.
    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Compute cost for a model call using the pricing table.
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.pricing
            .compute_cost(model, input_tokens, output_tokens)
    }

    // ── Recording ─────────────────────────────────────────────────────

    /// Record a completed turn and update running totals. Never fails.
    ///
    /// Testing turns are kept in the ring so they can be inspected, but
    /// they do not contribute to token, cost, or latency aggregates.
    pub fn record_turn(&self, record: TurnRecord) {
        tracing::info!(
            model = %record.model,
            tokens_in = record.tokens_in,
            tokens_out = record.tokens_out,
            cost_usd = record.cost_usd,
            source = record
                .usage_source
                .map(|s| s.as_str())
                .unwrap_or("none"),
            finish_reason = %record.finish_reason,
            retries = record.retries,
            testing = record.testing,
            "turn recorded"
        );

        {
            let mut totals = self.totals.write().unwrap_or_else(|e| e.into_inner());

            if record.testing {
                totals.testing_turns += 1;
            } else {
                totals.counted_turns += 1;
                if record.is_error() {
                    totals.error_turns += 1;
                }
                totals.tokens_in += record.tokens_in as u64;
                totals.tokens_out += record.tokens_out as u64;
                totals.cost_usd += record.cost_usd;

                match record.usage_source {
                    Some(UsageSource::Provider) => totals.provider_turns += 1,
                    Some(UsageSource::Estimated) => totals.estimated_turns += 1,
                    None => {}
                }

                if let Some(ttft) = record.ttft_ms {
                    totals.ttft_sum_ms += ttft;
                    totals.ttft_samples += 1;
                }
            }
        }

        let mut turns = self.turns.write().unwrap_or_else(|e| e.into_inner());
        turns.push_back(record);
        while turns.len() > self.retain {
            turns.pop_front();
        }
    }

    // ── Queries ───────────────────────────────────────────────────────

    /// Get a real-time usage snapshot.
    pub fn usage_snapshot(&self) -> UsageSnapshot {
        let totals = self.totals.read().unwrap_or_else(|e| e.into_inner());
        let recorded = self.turn_count();

        let avg_ttft_ms = if totals.ttft_samples > 0 {
            Some(totals.ttft_sum_ms as f64 / totals.ttft_samples as f64)
        } else {
            None
        };

        UsageSnapshot {
            total_turns: totals.counted_turns,
            error_turns: totals.error_turns,
            testing_turns: totals.testing_turns,
            total_tokens_in: totals.tokens_in,
            total_tokens_out: totals.tokens_out,
            total_cost_usd: totals.cost_usd,
            provider_usage_turns: totals.provider_turns,
            estimated_usage_turns: totals.estimated_turns,
            avg_ttft_ms,
            recorded_turns: recorded,
        }
    }

    /// List recent turns (most recent first).
    pub fn recent_turns(&self, limit: usize) -> Vec<TurnRecord> {
        let turns = self.turns.read().unwrap_or_else(|e| e.into_inner());
        turns.iter().rev().take(limit).cloned().collect()
    }

    /// Number of turn records currently held.
    pub fn turn_count(&self) -> usize {
        self.turns
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

impl Default for TelemetryEngine {
    fn default() -> Self {
        Self::new()
    }
}
