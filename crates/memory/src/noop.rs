//! No-op memory store — memory retrieval disabled entirely.

use async_trait::async_trait;
use ironquill_core::error::MemoryError;
use ironquill_core::memory::{MemoryFragment, MemoryQuery, MemoryStore};

/// A store that remembers nothing.
pub struct NoopStore;

#[async_trait]
impl MemoryStore for NoopStore {
    fn name(&self) -> &str {
        "noop"
    }

    async fn retrieve(
        &self,
        _query: MemoryQuery,
    ) -> std::result::Result<Vec<MemoryFragment>, MemoryError> {
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn always_empty() {
        let store = NoopStore;
        let results = store.retrieve(MemoryQuery::new("anything")).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(store.name(), "noop");
    }
}
