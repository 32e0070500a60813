//! Retrieval engine abstraction and implementations
//!
//! The router treats both retrieval backends as opaque rankers behind the
//! [`RetrievalEngine`] trait:
//! - StaticEngine: in-memory fixture engine for demos and tests
//! - HttpRetrievalEngine: remote engine reached over a JSON search endpoint
//!
//! ## Environment Variables
//!
//! - `TRADITIONAL_ENGINE_URL`: hybrid engine base URL (default: http://localhost:9100)
//! - `GRAPH_ENGINE_URL`: graph engine base URL (default: http://localhost:9200)

use crate::{RetrievedPassage, RouterError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Trait for retrieval backends
///
/// Implementations must be thread-safe (Send + Sync) because combined search
/// moves engine handles into spawned tasks.
/// The trait is object-safe to allow dynamic dispatch via Arc<dyn RetrievalEngine>.
#[async_trait]
pub trait RetrievalEngine: Send + Sync {
    /// Return up to `k` passages ranked by the engine's own relevance order.
    ///
    /// Engines may return more than `k`; the router does not trim per engine.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>, RouterError>;
}

// ============================================================================
// Static Engine (Testing)
// ============================================================================

/// Fixture engine returning a fixed ranked list
///
/// Returns the first `k` configured passages after an optional delay.
/// Useful for router smoke tests without real retrieval backends.
pub struct StaticEngine {
    name: String,
    passages: Vec<RetrievedPassage>,
    /// Simulated search latency
    pub delay_ms: u64,
}

impl StaticEngine {
    /// Create a fixture engine from plain content strings.
    pub fn new(name: impl Into<String>, contents: &[&str]) -> Self {
        Self {
            name: name.into(),
            passages: contents.iter().map(|c| RetrievedPassage::new(*c)).collect(),
            delay_ms: 0,
        }
    }

    /// Create a fixture engine from prepared passages.
    pub fn from_passages(name: impl Into<String>, passages: Vec<RetrievedPassage>) -> Self {
        Self {
            name: name.into(),
            passages,
            delay_ms: 0,
        }
    }

    /// Set simulated latency.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    /// Engine name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl RetrievalEngine for StaticEngine {
    async fn search(&self, _query: &str, k: usize) -> Result<Vec<RetrievedPassage>, RouterError> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        let passages: Vec<_> = self.passages.iter().take(k).cloned().collect();
        debug!(engine = self.name(), k, count = passages.len(), "static engine search");
        Ok(passages)
    }
}

// ============================================================================
// HTTP Engine
// ============================================================================

/// Search request payload
#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    query: &'a str,
    k: usize,
}

/// Search response payload
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    passages: Vec<RetrievedPassage>,
}

/// Remote retrieval engine
///
/// POSTs `{"query": ..., "k": ...}` to `{url}{path}` and expects
/// `{"passages": [{"content": ..., "metadata": {...}}]}` back.
///
/// ## Example
///
/// ```no_run
/// use tokio_query_router::HttpRetrievalEngine;
/// use std::sync::Arc;
///
/// let graph = Arc::new(
///     HttpRetrievalEngine::graph()
///         .with_url("http://graph-rag:9200")
///         .with_timeout(std::time::Duration::from_secs(20))
/// );
/// ```
pub struct HttpRetrievalEngine {
    client: reqwest::Client,
    name: String,
    url: String,
    path: String,
    timeout: Duration,
}

impl HttpRetrievalEngine {
    /// Create an engine client for an arbitrary endpoint.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: name.into(),
            url: url.into(),
            path: "/search".to_string(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Hybrid (vector + keyword) engine client.
    ///
    /// Reads the base URL from TRADITIONAL_ENGINE_URL,
    /// or defaults to http://localhost:9100
    pub fn traditional() -> Self {
        let url = std::env::var("TRADITIONAL_ENGINE_URL")
            .unwrap_or_else(|_| "http://localhost:9100".to_string());
        Self::new("traditional", url).with_path("/hybrid_search")
    }

    /// Graph RAG engine client.
    ///
    /// Reads the base URL from GRAPH_ENGINE_URL,
    /// or defaults to http://localhost:9200
    pub fn graph() -> Self {
        let url = std::env::var("GRAPH_ENGINE_URL")
            .unwrap_or_else(|_| "http://localhost:9200".to_string());
        Self::new("graph_rag", url).with_path("/graph_rag_search")
    }

    /// Set base URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Set endpoint path
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl RetrievalEngine for HttpRetrievalEngine {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedPassage>, RouterError> {
        let response = self
            .client
            .post(format!("{}{}", self.url, self.path))
            .timeout(self.timeout)
            .json(&SearchRequest { query, k })
            .send()
            .await
            .map_err(|e| RouterError::engine(&self.name, format!("request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(RouterError::engine(
                &self.name,
                format!("HTTP {status}: {error_text}"),
            ));
        }

        let body: SearchResponse = response
            .json()
            .await
            .map_err(|e| RouterError::engine(&self.name, format!("failed to parse response: {e}")))?;

        Ok(body.passages)
    }
}
