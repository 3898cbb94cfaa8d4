//! Memory retrieval backends for IronQuill.
//!
//! All backends implement `ironquill_core::MemoryStore`. Retrieval failures
//! are survivable by contract; callers degrade to streaming without context.

pub mod http;
pub mod in_memory;
pub mod noop;

pub use http::HttpMemoryStore;
pub use in_memory::InMemoryStore;
pub use noop::NoopStore;

use ironquill_config::AppConfig;
use ironquill_core::MemoryStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Build the configured memory store, or None when memory is disabled.
///
/// Turns with `useMemory` set are answered without context when this
/// returns None.
pub fn build_store(config: &AppConfig) -> Option<Arc<dyn MemoryStore>> {
    if !config.memory.enabled {
        return None;
    }

    match config.memory.backend.as_str() {
        "noop" => Some(Arc::new(NoopStore)),
        "in_memory" => Some(Arc::new(InMemoryStore::demo())),
        "http" => {
            let Some(base_url) = config.memory.base_url.clone() else {
                warn!("memory.backend is \"http\" but memory.base_url is unset; memory disabled");
                return None;
            };
            Some(Arc::new(
                HttpMemoryStore::new(base_url, config.memory.api_key.clone())
                    .with_timeout(Duration::from_secs(10)),
            ))
        }
        other => {
            warn!(backend = %other, "unknown memory backend; memory disabled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_memory_builds_nothing() {
        let config = AppConfig::default();
        assert!(build_store(&config).is_none());
    }

    #[test]
    fn builds_noop_backend() {
        let mut config = AppConfig::default();
        config.memory.enabled = true;
        config.memory.backend = "noop".into();
        let store = build_store(&config).unwrap();
        assert_eq!(store.name(), "noop");
    }

    #[test]
    fn builds_in_memory_backend() {
        let mut config = AppConfig::default();
        config.memory.enabled = true;
        config.memory.backend = "in_memory".into();
        let store = build_store(&config).unwrap();
        assert_eq!(store.name(), "in_memory");
    }

    #[test]
    fn http_backend_requires_base_url() {
        let mut config = AppConfig::default();
        config.memory.enabled = true;
        config.memory.backend = "http".into();
        config.memory.base_url = None;
        assert!(build_store(&config).is_none());

        config.memory.base_url = Some("http://localhost:9200".into());
        let store = build_store(&config).unwrap();
        assert_eq!(store.name(), "http");
    }
}
