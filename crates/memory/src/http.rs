//! HTTP memory store — client for a remote memory/retrieval service.
//!
//! POSTs the query as JSON and expects ranked fragments back:
//! `{"results": [{"content": ..., "score": ..., "source": ...}]}`.

use async_trait::async_trait;
use ironquill_core::error::MemoryError;
use ironquill_core::memory::{MemoryFragment, MemoryQuery, MemoryStore};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for a remote memory service.
pub struct HttpMemoryStore {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpMemoryStore {
    /// Create a client against `base_url` (the retrieve endpoint is
    /// `{base_url}/retrieve`).
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            client: build_client(DEFAULT_TIMEOUT),
        }
    }

    /// Replace the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client = build_client(timeout);
        self
    }

    fn retrieve_url(&self) -> String {
        format!("{}/retrieve", self.base_url)
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("failed to build HTTP client")
}

#[async_trait]
impl MemoryStore for HttpMemoryStore {
    fn name(&self) -> &str {
        "http"
    }

    async fn retrieve(
        &self,
        query: MemoryQuery,
    ) -> std::result::Result<Vec<MemoryFragment>, MemoryError> {
        let url = self.retrieve_url();
        debug!(url = %url, query = %query.query, "querying memory service");

        let mut request = self.client.post(&url).json(&query);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {key}"));
        }

        let response = request
            .send()
            .await
            .map_err(|e| MemoryError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MemoryError::QueryFailed(format!(
                "memory service returned {status}: {body}"
            )));
        }

        let parsed: RetrieveResponse = response
            .json()
            .await
            .map_err(|e| MemoryError::InvalidResponse(e.to_string()))?;

        Ok(parsed.results)
    }
}

#[derive(Debug, Deserialize)]
struct RetrieveResponse {
    #[serde(default)]
    results: Vec<MemoryFragment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retrieve_url_built_from_base() {
        let store = HttpMemoryStore::new("http://localhost:9200/", None);
        assert_eq!(store.retrieve_url(), "http://localhost:9200/retrieve");
        assert_eq!(store.name(), "http");
    }

    #[test]
    fn parse_ranked_results() {
        let body = r#"{
            "results": [
                {"content": "User works in UTC+2", "score": 0.91, "source": "profile"},
                {"content": "User likes terse answers", "score": 0.74}
            ]
        }"#;
        let parsed: RetrieveResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].source.as_deref(), Some("profile"));
        assert!(parsed.results[0].score > parsed.results[1].score);
    }

    #[test]
    fn parse_missing_results_field() {
        let parsed: RetrieveResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.results.is_empty());
    }

    #[test]
    fn query_serializes_for_the_wire() {
        let query = MemoryQuery::new("what did I say about deadlines")
            .with_session("session-20260821-101500-ab12")
            .with_limit(3);
        let json = serde_json::to_value(&query).unwrap();
        assert_eq!(json["query"], "what did I say about deadlines");
        assert_eq!(json["session_id"], "session-20260821-101500-ab12");
        assert_eq!(json["limit"], 3);
    }
}
