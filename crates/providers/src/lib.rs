//! Completion provider implementations for IronQuill.
//!
//! All providers implement the `ironquill_core::Provider` trait. The
//! gateway drives whichever one `build_provider` hands it.

pub mod openai_compat;
pub mod retry;
pub mod scripted;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryingProvider;
pub use scripted::{ScriptStep, ScriptedProvider};

use ironquill_config::AppConfig;
use ironquill_core::Provider;
use std::sync::Arc;
use std::time::Duration;

/// Build the configured provider, wrapped with the retry policy.
///
/// `provider.kind = "scripted"` yields the demo playback provider; anything
/// else is treated as an OpenAI-compatible endpoint at `provider.api_url`.
pub fn build_provider(config: &AppConfig) -> Arc<dyn Provider> {
    let inner: Arc<dyn Provider> = if config.provider.kind == "scripted" {
        Arc::new(ScriptedProvider::demo())
    } else {
        Arc::new(
            OpenAiCompatProvider::new(
                config.provider.kind.clone(),
                config.provider.api_url.clone(),
                config.provider.api_key.clone().unwrap_or_default(),
            )
            .with_timeout(Duration::from_secs(config.provider.request_timeout_secs)),
        )
    };

    Arc::new(
        RetryingProvider::new(inner)
            .with_max_attempts(config.stream.retry.max_attempts)
            .with_base_delay(Duration::from_millis(config.stream.retry.base_delay_ms)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_openai_by_default() {
        let config = AppConfig::default();
        let provider = build_provider(&config);
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn builds_scripted_when_configured() {
        let mut config = AppConfig::default();
        config.provider.kind = "scripted".into();
        let provider = build_provider(&config);
        assert_eq!(provider.name(), "scripted");
    }
}
