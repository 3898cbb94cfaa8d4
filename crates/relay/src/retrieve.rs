//! Memory context retrieval for a turn.
//!
//! Retrieval is strictly best-effort. A missing store, a disabled flag, an
//! empty result, or a backend failure all degrade to "no context" and the
//! turn proceeds without it.

use std::time::Instant;

use ironquill_core::{MemoryFragment, MemoryQuery, MemoryStore};
use tracing::{debug, warn};

use crate::usage::estimate_tokens_from_chars;
use crate::validate::ValidatedTurn;

/// Retrieved memory context for one turn.
#[derive(Debug, Clone)]
pub struct MemoryContext {
    /// Fragments in the store's ranking order.
    pub fragments: Vec<MemoryFragment>,
    /// Rough token footprint of the fragment text.
    pub estimated_tokens: u32,
    /// Wall time the retrieval took.
    pub elapsed_ms: u64,
}

impl MemoryContext {
    /// The fragments as a numbered list, the form used both in the prompt
    /// and in the memory event when the client asks for it.
    pub fn formatted(&self) -> String {
        self.fragments
            .iter()
            .enumerate()
            .map(|(i, fragment)| format!("{}. {}", i + 1, fragment.content))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Retrieves memory context for a validated turn.
///
/// Returns `None` without touching the store when the turn did not ask for
/// memory or no store is configured. Returns `None` (with a warning) when
/// the store fails; a turn never fails because memory did.
pub async fn retrieve_context(
    store: Option<&dyn MemoryStore>,
    turn: &ValidatedTurn,
    limit: usize,
) -> Option<MemoryContext> {
    if !turn.use_memory {
        return None;
    }
    let store = store?;

    let mut query = MemoryQuery::new(&turn.message).with_limit(limit);
    if let Some(id) = &turn.session_id {
        query = query.with_session(id);
    }

    let started = Instant::now();
    match store.retrieve(query).await {
        Ok(fragments) if fragments.is_empty() => {
            debug!(store = store.name(), "memory retrieval returned no fragments");
            None
        }
        Ok(fragments) => {
            let elapsed_ms = started.elapsed().as_millis() as u64;
            let chars: usize = fragments.iter().map(|f| f.content.chars().count()).sum();
            debug!(
                store = store.name(),
                count = fragments.len(),
                elapsed_ms,
                "memory context retrieved"
            );
            Some(MemoryContext {
                fragments,
                estimated_tokens: estimate_tokens_from_chars(chars),
                elapsed_ms,
            })
        }
        Err(e) => {
            warn!(store = store.name(), error = %e, "memory retrieval failed, continuing without context");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use ironquill_core::MemoryError;
    use ironquill_memory::InMemoryStore;

    use super::*;
    use crate::validate::{ChatTurnRequest, TurnDefaults, validate};

    fn turn_with_memory(message: &str) -> ValidatedTurn {
        let mut request = ChatTurnRequest::new(message);
        request.use_memory = true;
        validate(request, &TurnDefaults::default(), &[]).unwrap()
    }

    struct CountingStore {
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl MemoryStore for CountingStore {
        fn name(&self) -> &str {
            "counting"
        }

        async fn retrieve(
            &self,
            _query: MemoryQuery,
        ) -> Result<Vec<MemoryFragment>, MemoryError> {
            *self.calls.lock().unwrap() += 1;
            Ok(vec![MemoryFragment::new("remembered", 1.0)])
        }
    }

    struct FailingStore;

    #[async_trait]
    impl MemoryStore for FailingStore {
        fn name(&self) -> &str {
            "failing"
        }

        async fn retrieve(
            &self,
            _query: MemoryQuery,
        ) -> Result<Vec<MemoryFragment>, MemoryError> {
            Err(MemoryError::Unavailable("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn skips_store_entirely_when_memory_not_requested() {
        let store = CountingStore {
            calls: Mutex::new(0),
        };
        let mut request = ChatTurnRequest::new("hello");
        request.use_memory = false;
        let turn = validate(request, &TurnDefaults::default(), &[]).unwrap();

        let context = retrieve_context(Some(&store), &turn, 5).await;
        assert!(context.is_none());
        assert_eq!(*store.calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn returns_none_without_a_store() {
        let turn = turn_with_memory("hello");
        assert!(retrieve_context(None, &turn, 5).await.is_none());
    }

    #[tokio::test]
    async fn retrieves_and_measures_latency() {
        let store = InMemoryStore::with_fragments([
            "The user's favorite color is teal",
            "The user lives in Lisbon",
        ]);
        let turn = turn_with_memory("what is my favorite color?");

        let context = retrieve_context(Some(&store), &turn, 5)
            .await
            .expect("context expected");
        assert!(!context.fragments.is_empty());
        assert!(context.fragments[0].content.contains("teal"));
        assert!(context.estimated_tokens > 0);
    }

    #[tokio::test]
    async fn empty_results_yield_no_context() {
        let store = InMemoryStore::new();
        let turn = turn_with_memory("anything at all");
        assert!(retrieve_context(Some(&store), &turn, 5).await.is_none());
    }

    #[tokio::test]
    async fn store_failure_degrades_to_no_context() {
        let turn = turn_with_memory("hello");
        assert!(retrieve_context(Some(&FailingStore), &turn, 5).await.is_none());
    }

    #[test]
    fn formatted_numbers_fragments_in_order() {
        let context = MemoryContext {
            fragments: vec![
                MemoryFragment::new("first fact", 0.9),
                MemoryFragment::new("second fact", 0.5),
            ],
            estimated_tokens: 5,
            elapsed_ms: 2,
        };
        assert_eq!(context.formatted(), "1. first fact\n2. second fact");
    }
}
