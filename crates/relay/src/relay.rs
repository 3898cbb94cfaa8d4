//! The completion relay: drives one provider stream into one session.
//!
//! The relay owns the ordering guarantees of a turn. Tokens are forwarded
//! as they arrive, exactly one usage event is emitted (provider-reported
//! when available, estimated otherwise), and exactly one done event ends
//! the stream, followed by the legacy `[DONE]` marker and session close.
//!
//! Upstream failures never surface as transport errors. The failure is
//! classified, a user-safe notice is appended to the visible reply, and
//! the turn finishes with `done: error`. Error turns get no usage
//! estimate.

use std::time::Instant;

use ironquill_core::{CompletionRequest, FinishReason, Provider, ProviderError};
use ironquill_telemetry::PricingTable;
use tracing::{debug, warn};

use crate::event::StreamEvent;
use crate::session::StreamingSession;
use crate::usage::UsageRecord;

/// What a relayed turn produced, for telemetry.
#[derive(Debug)]
pub struct RelayOutcome {
    pub finish_reason: FinishReason,
    pub usage: Option<UsageRecord>,
    pub ttft_ms: Option<u64>,
    pub retries: u32,
}

/// A classified upstream failure: a stable machine code and a message safe
/// to show to end users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorNotice {
    pub code: &'static str,
    pub message: &'static str,
}

/// Maps a provider error onto its wire code and user-safe message. The
/// real error is only ever logged, never sent to clients.
pub fn classify_provider_error(error: &ProviderError) -> ErrorNotice {
    match error {
        ProviderError::AuthenticationFailed(_) => ErrorNotice {
            code: "auth",
            message: "The upstream model provider rejected this server's credentials.",
        },
        ProviderError::RateLimited { .. } => ErrorNotice {
            code: "rate_limit",
            message: "The model is receiving too many requests right now. Please try again in a moment.",
        },
        ProviderError::Timeout(_) => ErrorNotice {
            code: "timeout",
            message: "The model took too long to respond. Please try again.",
        },
        ProviderError::ApiError { .. }
        | ProviderError::StreamInterrupted(_)
        | ProviderError::Network(_) => ErrorNotice {
            code: "server",
            message: "The model service ran into a problem while responding. Please try again.",
        },
        ProviderError::ModelNotFound(_) => ErrorNotice {
            code: "unknown",
            message: "The requested model is not available right now.",
        },
        ProviderError::NotConfigured(_) => ErrorNotice {
            code: "unknown",
            message: "The service is not configured to handle this request.",
        },
    }
}

/// Streams one completion into the session and closes it.
///
/// `turn_started` anchors the time-to-first-token measurement; pass the
/// instant the request began processing, not the instant the provider call
/// went out.
pub async fn relay_completion(
    session: &StreamingSession,
    provider: &dyn Provider,
    pricing: &PricingTable,
    request: CompletionRequest,
    turn_started: Instant,
) -> RelayOutcome {
    let cancel = session.cancellation_token();
    let model = request.model.clone();

    let mut stream = match provider.stream(request.clone(), cancel).await {
        Ok(stream) => stream,
        Err(e) => return fail_turn(session, &e, None, None, 0).await,
    };
    let retries = stream.retries;

    let mut output = String::new();
    let mut ttft_ms: Option<u64> = None;
    let mut usage: Option<UsageRecord> = None;
    let mut finish_reason: Option<FinishReason> = None;

    while let Some(item) = stream.chunks.recv().await {
        match item {
            Ok(chunk) => {
                if let Some(text) = chunk.delta
                    && !text.is_empty()
                {
                    if ttft_ms.is_none() {
                        let elapsed = turn_started.elapsed().as_millis() as u64;
                        ttft_ms = Some(elapsed);
                        debug!(ttft_ms = elapsed, "first token");
                    }
                    output.push_str(&text);
                    session.send_event(StreamEvent::Token { text }).await;
                }
                if let Some(reported) = chunk.usage
                    && usage.is_none()
                {
                    let record = UsageRecord::from_provider(pricing, &model, reported, ttft_ms);
                    session.send_event(record.to_event()).await;
                    usage = Some(record);
                }
                if chunk.done {
                    finish_reason = Some(chunk.finish_reason.unwrap_or(FinishReason::Stop));
                    break;
                }
            }
            Err(e) => return fail_turn(session, &e, usage, ttft_ms, retries).await,
        }
    }

    let finish_reason = finish_reason.unwrap_or(FinishReason::Stop);

    if usage.is_none() && finish_reason != FinishReason::Error {
        let record = UsageRecord::estimated(pricing, &model, &request.messages, &output, ttft_ms);
        session.send_event(record.to_event()).await;
        usage = Some(record);
    }

    finish(session, finish_reason).await;
    RelayOutcome {
        finish_reason,
        usage,
        ttft_ms,
        retries,
    }
}

/// Ends a failed turn: user-safe notice, structured error event, terminal
/// done. Never estimates usage.
async fn fail_turn(
    session: &StreamingSession,
    error: &ProviderError,
    usage: Option<UsageRecord>,
    ttft_ms: Option<u64>,
    retries: u32,
) -> RelayOutcome {
    let notice = classify_provider_error(error);
    warn!(code = notice.code, error = %error, "turn failed");

    session
        .send_event(StreamEvent::Token {
            text: notice.message.to_string(),
        })
        .await;
    session
        .send_event(StreamEvent::Error {
            message: notice.message.to_string(),
            code: notice.code.to_string(),
        })
        .await;
    finish(session, FinishReason::Error).await;

    RelayOutcome {
        finish_reason: FinishReason::Error,
        usage,
        ttft_ms,
        retries,
    }
}

async fn finish(session: &StreamingSession, reason: FinishReason) {
    session
        .send_event(StreamEvent::Done {
            finish_reason: reason,
        })
        .await;
    session.send_done_marker().await;
    session.close().await;
}
