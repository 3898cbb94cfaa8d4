//! In-memory store — keyword-overlap retrieval over seeded fragments.
//!
//! For tests and local development. No persistence.

use async_trait::async_trait;
use ironquill_core::error::MemoryError;
use ironquill_core::memory::{MemoryFragment, MemoryQuery, MemoryStore};
use tokio::sync::RwLock;

/// A store that ranks seeded text fragments by keyword overlap.
pub struct InMemoryStore {
    fragments: RwLock<Vec<Seeded>>,
}

#[derive(Clone)]
struct Seeded {
    content: String,
    source: Option<String>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            fragments: RwLock::new(Vec::new()),
        }
    }

    /// Create a store pre-seeded with fragments.
    pub fn with_fragments<I, S>(contents: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: RwLock::new(
                contents
                    .into_iter()
                    .map(|c| Seeded {
                        content: c.into(),
                        source: None,
                    })
                    .collect(),
            ),
        }
    }

    /// A store with canned fragments for local development.
    pub fn demo() -> Self {
        Self::with_fragments([
            "The user prefers concise answers with code examples.",
            "Earlier the user mentioned they are building a streaming chat service in Rust.",
            "The user's deployment target is a single small VM behind nginx.",
        ])
    }

    /// Add a fragment at runtime.
    pub async fn add(&self, content: impl Into<String>, source: Option<String>) {
        self.fragments.write().await.push(Seeded {
            content: content.into(),
            source,
        });
    }

    /// Number of seeded fragments.
    pub async fn len(&self) -> usize {
        self.fragments.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.fragments.read().await.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    fn name(&self) -> &str {
        "in_memory"
    }

    async fn retrieve(
        &self,
        query: MemoryQuery,
    ) -> std::result::Result<Vec<MemoryFragment>, MemoryError> {
        let fragments = self.fragments.read().await;

        let query_words: Vec<String> = query
            .query
            .to_lowercase()
            .split_whitespace()
            .map(String::from)
            .collect();
        if query_words.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<MemoryFragment> = fragments
            .iter()
            .filter_map(|f| {
                let content_lower = f.content.to_lowercase();
                let matched = query_words
                    .iter()
                    .filter(|w| content_lower.contains(w.as_str()))
                    .count();
                if matched == 0 {
                    return None;
                }

                let score = matched as f32 / query_words.len() as f32;
                let mut fragment = MemoryFragment::new(f.content.clone(), score);
                fragment.source = f.source.clone();
                Some(fragment)
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(query.limit);

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ranks_by_keyword_overlap() {
        let store = InMemoryStore::with_fragments([
            "Rust ownership rules prevent data races",
            "Python scripting tips",
            "Rust async streams and channels",
        ]);

        let results = store
            .retrieve(MemoryQuery::new("rust async channels"))
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        // Full three-word overlap beats single-word overlap.
        assert!(results[0].content.contains("async streams"));
        assert!(results[0].score > results[1].score);
    }

    #[tokio::test]
    async fn respects_limit() {
        let store = InMemoryStore::with_fragments([
            "alpha one",
            "alpha two",
            "alpha three",
            "alpha four",
        ]);

        let results = store
            .retrieve(MemoryQuery::new("alpha").with_limit(2))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
    }

    #[tokio::test]
    async fn no_match_returns_empty() {
        let store = InMemoryStore::with_fragments(["completely unrelated text"]);
        let results = store
            .retrieve(MemoryQuery::new("quantum entanglement"))
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn empty_query_returns_empty() {
        let store = InMemoryStore::with_fragments(["something"]);
        let results = store.retrieve(MemoryQuery::new("   ")).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn add_at_runtime() {
        let store = InMemoryStore::new();
        assert!(store.is_empty().await);

        store
            .add("the user likes espresso", Some("profile".into()))
            .await;
        assert_eq!(store.len().await, 1);

        let results = store.retrieve(MemoryQuery::new("espresso")).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source.as_deref(), Some("profile"));
    }

    #[tokio::test]
    async fn scores_are_normalized() {
        let store = InMemoryStore::with_fragments(["rust streaming service"]);
        let results = store
            .retrieve(MemoryQuery::new("rust streaming"))
            .await
            .unwrap();
        assert!((results[0].score - 1.0).abs() < f32::EPSILON);
    }
}
