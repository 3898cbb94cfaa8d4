//! Scripted provider — deterministic chunk playback.
//!
//! Plays a fixed list of steps for every request, regardless of input.
//! Used by tests and by `serve --scripted` for keyless local development.

use async_trait::async_trait;
use ironquill_core::error::ProviderError;
use ironquill_core::provider::{
    CompletionChunk, CompletionRequest, CompletionStream, FinishReason, Provider,
};
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One step of a playback script.
#[derive(Debug, Clone)]
pub enum ScriptStep {
    /// Emit a content delta.
    Token(String),
    /// Emit an inline usage report (tokens in, tokens out).
    Usage(u32, u32),
    /// Emit the terminal chunk.
    Finish(FinishReason),
    /// Emit a stream error. Ends the script.
    Error(ProviderError),
}

/// A provider that replays a configured script.
pub struct ScriptedProvider {
    name: String,
    script: Vec<ScriptStep>,
    models: Vec<String>,
    chunk_delay: Duration,
    fail_first: Mutex<u32>,
    fail_error: Option<ProviderError>,
    stream_calls: Mutex<usize>,
}

impl ScriptedProvider {
    /// Create a provider with an empty script.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Vec::new(),
            models: Vec::new(),
            chunk_delay: Duration::ZERO,
            fail_first: Mutex::new(0),
            fail_error: None,
            stream_calls: Mutex::new(0),
        }
    }

    /// A canned script for local development: a short streamed greeting
    /// with inline usage, paced so the stream is visible to the eye.
    pub fn demo() -> Self {
        Self::new("scripted")
            .tokens([
                "Hello!",
                " This",
                " is",
                " the",
                " scripted",
                " provider",
                " speaking.",
            ])
            .usage(12, 7)
            .finish(FinishReason::Stop)
            .with_models(["gpt-4o-mini", "scripted-mini"])
            .with_chunk_delay(Duration::from_millis(40))
    }

    /// Append a content delta step.
    pub fn token(mut self, text: impl Into<String>) -> Self {
        self.script.push(ScriptStep::Token(text.into()));
        self
    }

    /// Append one content delta step per item.
    pub fn tokens<I, S>(mut self, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for text in texts {
            self.script.push(ScriptStep::Token(text.into()));
        }
        self
    }

    /// Append an inline usage step.
    pub fn usage(mut self, tokens_in: u32, tokens_out: u32) -> Self {
        self.script.push(ScriptStep::Usage(tokens_in, tokens_out));
        self
    }

    /// Append the terminal step.
    pub fn finish(mut self, reason: FinishReason) -> Self {
        self.script.push(ScriptStep::Finish(reason));
        self
    }

    /// Append an error step; playback stops after emitting it.
    pub fn error(mut self, error: ProviderError) -> Self {
        self.script.push(ScriptStep::Error(error));
        self
    }

    /// Fail the first `n` stream establishments with `error`.
    pub fn fail_first(mut self, n: u32, error: ProviderError) -> Self {
        self.fail_first = Mutex::new(n);
        self.fail_error = Some(error);
        self
    }

    /// Pace playback with a delay before each step.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = delay;
        self
    }

    /// Set what `list_models` reports.
    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }

    /// How many times `stream` has been called.
    pub fn stream_calls(&self) -> usize {
        *self
            .stream_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn stream(
        &self,
        _request: CompletionRequest,
        cancel: CancellationToken,
    ) -> std::result::Result<CompletionStream, ProviderError> {
        *self
            .stream_calls
            .lock()
            .unwrap_or_else(|e| e.into_inner()) += 1;

        {
            let mut remaining = self.fail_first.lock().unwrap_or_else(|e| e.into_inner());
            if *remaining > 0 {
                *remaining -= 1;
                return Err(self
                    .fail_error
                    .clone()
                    .unwrap_or_else(|| ProviderError::Network("scripted failure".into())));
            }
        }

        let script = self.script.clone();
        let delay = self.chunk_delay;
        let (tx, rx) = tokio::sync::mpsc::channel(16);

        tokio::spawn(async move {
            for step in script {
                if delay > Duration::ZERO {
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(delay) => {}
                    }
                } else if cancel.is_cancelled() {
                    return;
                }

                let terminal = matches!(step, ScriptStep::Error(_));
                let item = match step {
                    ScriptStep::Token(text) => Ok(CompletionChunk::delta(text)),
                    ScriptStep::Usage(tokens_in, tokens_out) => {
                        Ok(CompletionChunk::usage(tokens_in, tokens_out))
                    }
                    ScriptStep::Finish(reason) => Ok(CompletionChunk::finished(reason)),
                    ScriptStep::Error(e) => Err(e),
                };

                if tx.send(item).await.is_err() || terminal {
                    return;
                }
            }
        });

        Ok(CompletionStream::new(rx))
    }

    async fn list_models(&self) -> std::result::Result<Vec<String>, ProviderError> {
        Ok(self.models.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ironquill_core::message::Message;

    fn request() -> CompletionRequest {
        CompletionRequest::new("any-model", vec![Message::user("hi")])
    }

    async fn collect(
        mut stream: CompletionStream,
    ) -> Vec<std::result::Result<CompletionChunk, ProviderError>> {
        let mut items = Vec::new();
        while let Some(item) = stream.chunks.recv().await {
            items.push(item);
        }
        items
    }

    #[tokio::test]
    async fn plays_script_in_order() {
        let provider = ScriptedProvider::new("test")
            .token("Hello")
            .token(" world")
            .usage(10, 2)
            .finish(FinishReason::Stop);

        let stream = provider
            .stream(request(), CancellationToken::new())
            .await
            .unwrap();
        let items = collect(stream).await;

        assert_eq!(items.len(), 4);
        assert_eq!(items[0].as_ref().unwrap().delta.as_deref(), Some("Hello"));
        assert_eq!(items[1].as_ref().unwrap().delta.as_deref(), Some(" world"));
        assert!(items[2].as_ref().unwrap().usage.is_some());
        let last = items[3].as_ref().unwrap();
        assert!(last.done);
        assert_eq!(last.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn error_step_ends_playback() {
        let provider = ScriptedProvider::new("test")
            .token("partial")
            .error(ProviderError::StreamInterrupted("connection reset".into()))
            .token("never sent");

        let stream = provider
            .stream(request(), CancellationToken::new())
            .await
            .unwrap();
        let items = collect(stream).await;

        assert_eq!(items.len(), 2);
        assert!(items[1].is_err());
    }

    #[tokio::test]
    async fn fail_first_exhausts_then_succeeds() {
        let provider = ScriptedProvider::new("test")
            .fail_first(
                2,
                ProviderError::RateLimited {
                    retry_after_secs: 1,
                },
            )
            .token("ok")
            .finish(FinishReason::Stop);

        assert!(
            provider
                .stream(request(), CancellationToken::new())
                .await
                .is_err()
        );
        assert!(
            provider
                .stream(request(), CancellationToken::new())
                .await
                .is_err()
        );
        assert!(
            provider
                .stream(request(), CancellationToken::new())
                .await
                .is_ok()
        );
        assert_eq!(provider.stream_calls(), 3);
    }

    #[tokio::test]
    async fn cancellation_stops_paced_playback() {
        let provider = ScriptedProvider::new("test")
            .tokens(["a", "b", "c", "d"])
            .finish(FinishReason::Stop)
            .with_chunk_delay(Duration::from_millis(20));

        let cancel = CancellationToken::new();
        let mut stream = provider.stream(request(), cancel.clone()).await.unwrap();

        let first = stream.chunks.recv().await.unwrap().unwrap();
        assert_eq!(first.delta.as_deref(), Some("a"));

        cancel.cancel();

        // Playback stops; the channel closes without the terminal chunk.
        let mut saw_done = false;
        while let Some(item) = stream.chunks.recv().await {
            if item.unwrap().done {
                saw_done = true;
            }
        }
        assert!(!saw_done);
    }

    #[tokio::test]
    async fn demo_script_terminates_cleanly() {
        let provider = ScriptedProvider::demo();
        let stream = provider
            .stream(request(), CancellationToken::new())
            .await
            .unwrap();
        let items = collect(stream).await;

        let last = items.last().unwrap().as_ref().unwrap();
        assert!(last.done);
        assert_eq!(last.finish_reason, Some(FinishReason::Stop));

        let text: String = items
            .iter()
            .filter_map(|i| i.as_ref().ok().and_then(|c| c.delta.clone()))
            .collect();
        assert!(text.contains("scripted"));
    }

    #[tokio::test]
    async fn lists_configured_models() {
        let provider = ScriptedProvider::new("test").with_models(["m1", "m2"]);
        let models = provider.list_models().await.unwrap();
        assert_eq!(models, vec!["m1".to_string(), "m2".to_string()]);
    }
}
