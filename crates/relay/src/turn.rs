//! One validated turn, start to finish.
//!
//! The [`TurnRunner`] wires the pieces together in order: memory retrieval,
//! the memory event, prompt assembly, the completion relay, and finally the
//! telemetry record. It is built once at startup and shared across turns.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use ironquill_core::{CompletionRequest, MemoryStore, Provider};
use ironquill_telemetry::{TelemetryEngine, TurnRecord};

use crate::event::StreamEvent;
use crate::prompt;
use crate::relay::relay_completion;
use crate::retrieve::retrieve_context;
use crate::session::StreamingSession;
use crate::validate::ValidatedTurn;

/// Default number of memory fragments folded into a prompt.
const DEFAULT_MEMORY_LIMIT: usize = 5;

/// Runs chat turns against a fixed provider, memory store, and telemetry
/// engine.
pub struct TurnRunner {
    provider: Arc<dyn Provider>,
    memory: Option<Arc<dyn MemoryStore>>,
    telemetry: Arc<TelemetryEngine>,
    temperature: f32,
    max_tokens: Option<u32>,
    memory_limit: usize,
}

impl TurnRunner {
    pub fn new(provider: Arc<dyn Provider>, telemetry: Arc<TelemetryEngine>) -> Self {
        Self {
            provider,
            memory: None,
            telemetry,
            temperature: 0.7,
            max_tokens: None,
            memory_limit: DEFAULT_MEMORY_LIMIT,
        }
    }

    pub fn with_memory(mut self, store: Arc<dyn MemoryStore>) -> Self {
        self.memory = Some(store);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_memory_limit(mut self, limit: usize) -> Self {
        self.memory_limit = limit.max(1);
        self
    }

    /// Runs one turn to completion. The session is closed and exactly one
    /// telemetry record exists when this returns, whatever happened
    /// upstream.
    pub async fn run(&self, turn: ValidatedTurn, session: &StreamingSession) {
        let started = Instant::now();
        let started_at = Utc::now();

        let context = retrieve_context(self.memory.as_deref(), &turn, self.memory_limit).await;
        if let Some(ctx) = &context {
            let results = turn.return_memory.then(|| ctx.formatted());
            session
                .send_event(StreamEvent::Memory {
                    results,
                    memory_ms: ctx.elapsed_ms,
                })
                .await;
        }

        let messages = prompt::assemble(&turn, context.as_ref());
        let mut request = CompletionRequest::new(&turn.model, messages);
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;

        let outcome = relay_completion(
            session,
            self.provider.as_ref(),
            self.telemetry.pricing(),
            request,
            started,
        )
        .await;

        let mut record = TurnRecord::new(&turn.model, outcome.finish_reason.as_str());
        record.session_id = turn.session_id;
        record.started_at = started_at;
        record.ended_at = Utc::now();
        if let Some(usage) = &outcome.usage {
            record.tokens_in = usage.tokens_in;
            record.tokens_out = usage.tokens_out;
            record.cost_usd = usage.cost_usd;
            record.usage_source = Some(usage.source);
        }
        record.ttft_ms = outcome.ttft_ms;
        record.memory_ms = context.as_ref().map(|c| c.elapsed_ms);
        record.retries = outcome.retries;
        record.testing = turn.testing_mode;
        self.telemetry.record_turn(record);
    }
}
