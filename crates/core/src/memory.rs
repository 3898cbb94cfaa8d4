//! Memory retrieval trait — the long-term memory capability boundary.
//!
//! The store itself (a knowledge-graph service, a database, whatever) lives
//! outside this system; all the orchestrator needs is ranked context
//! fragments for a query. Retrieval failures are always survivable: the
//! caller degrades to "no context" and the turn proceeds.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::MemoryError;

/// A query against the memory capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQuery {
    /// The search text (normally the user's message)
    pub query: String,

    /// Scope results to one chat session, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Maximum number of fragments
    #[serde(default = "default_limit")]
    pub limit: usize,
}

impl MemoryQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self { query: query.into(), session_id: None, limit: default_limit() }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }
}

fn default_limit() -> usize {
    5
}

/// One ranked context fragment returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryFragment {
    /// The remembered text
    pub content: String,

    /// Relevance score assigned by the store (higher is better)
    #[serde(default)]
    pub score: f32,

    /// Where the memory came from, if the store tracks it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl MemoryFragment {
    pub fn new(content: impl Into<String>, score: f32) -> Self {
        Self { content: content.into(), score, source: None }
    }
}

/// The memory capability. Implementations: HTTP service client, in-memory
/// keyword store (tests, local dev), no-op.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    /// The backend name (e.g., "http", "in_memory", "noop").
    fn name(&self) -> &str;

    /// Retrieve ranked fragments for a query. An empty vec is a normal
    /// answer, not an error.
    async fn retrieve(
        &self,
        query: MemoryQuery,
    ) -> std::result::Result<Vec<MemoryFragment>, MemoryError>;
}
