//! Retry wrapper — bounded exponential backoff at stream establishment.
//!
//! Retries only the `stream()` call itself, which always happens before any
//! token has reached a client. Once a stream is up, failures inside it are
//! the relay's problem and are never retried here.

use async_trait::async_trait;
use ironquill_core::error::ProviderError;
use ironquill_core::provider::{CompletionRequest, CompletionStream, Provider};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Wraps any provider with establishment retries on transient failures.
pub struct RetryingProvider {
    inner: Arc<dyn Provider>,
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryingProvider {
    /// Wrap a provider with default policy (3 attempts, 250ms base delay).
    pub fn new(inner: Arc<dyn Provider>) -> Self {
        Self {
            inner,
            max_attempts: 3,
            base_delay: Duration::from_millis(250),
        }
    }

    /// Set the total attempt budget (first try included, minimum 1).
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Set the base backoff delay; attempt N waits `base * 2^N`.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }
}

#[async_trait]
impl Provider for RetryingProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn stream(
        &self,
        request: CompletionRequest,
        cancel: CancellationToken,
    ) -> std::result::Result<CompletionStream, ProviderError> {
        let mut attempt: u32 = 0;

        loop {
            match self.inner.stream(request.clone(), cancel.clone()).await {
                Ok(mut stream) => {
                    if attempt > 0 {
                        debug!(
                            provider = %self.inner.name(),
                            retries = attempt,
                            "stream established after retries"
                        );
                    }
                    stream.retries = attempt;
                    return Ok(stream);
                }
                Err(e) if e.is_transient() && attempt + 1 < self.max_attempts => {
                    let delay = self.base_delay * 2u32.pow(attempt);
                    warn!(
                        provider = %self.inner.name(),
                        error = %e,
                        attempt = attempt + 1,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "transient stream failure, backing off"
                    );
                    attempt += 1;

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(e),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        self.inner.list_models().await
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        self.inner.health_check().await
    }
}
