//! # tokio-query-router
//!
//! Intelligent query routing for knowledge-augmented question answering.
//!
//! ## Architecture
//!
//! Every query is classified, dispatched to one retrieval path, annotated,
//! and counted:
//! ```text
//! query → QueryClassifier → dispatch ─┬─ Traditional ───────────────┐
//!                                     ├─ GraphRag ──────────────────┤→ annotate → stats
//!                                     └─ Combined (graph ∥ trad) ───┘
//! ```
//!
//! The classifier asks a remote completion service first and falls back to a
//! deterministic keyword classifier on any failure. Combined search runs both
//! engines concurrently under a shared deadline and merges them round-robin,
//! graph results first, deduplicated by content prefix.

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod config;
pub mod engine;
pub mod llm;
pub mod metrics;
pub mod routing;

// Re-exports for convenience
pub use engine::{HttpRetrievalEngine, RetrievalEngine, StaticEngine};
pub use llm::{CompletionClient, OpenAiChatClient, ScriptedClient};
pub use routing::{
    IntelligentQueryRouter, QueryAnalysis, QueryClassifier, RoutingStatistics, SearchStrategy,
};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"` — structured JSON output for log aggregators
/// - anything else (including unset) — human-readable pretty output
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`RouterError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Panics
///
/// This function never panics.
pub fn init_tracing() -> Result<(), RouterError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());

    let result = match format.as_str() {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| RouterError::Other(format!("tracing init failed: {e}")))
}

/// Top-level router errors.
///
/// Only [`RouterError::Engine`] ever escapes `route_query`, and only when both
/// the selected path and the traditional fallback failed. The remaining
/// variants surface from collaborators and construction.
#[derive(Error, Debug)]
pub enum RouterError {
    /// A retrieval engine call failed (network, backend, or parsing error).
    #[error("retrieval engine '{engine}' failed: {message}")]
    Engine {
        /// Engine identifier (`traditional` or `graph_rag`).
        engine: String,
        /// Human-readable failure description.
        message: String,
    },

    /// The classification service failed or returned an unusable payload.
    #[error("classification failed: {0}")]
    Classifier(String),

    /// A classification payload violated the [`QueryAnalysis`] schema.
    #[error("invalid query analysis: {0}")]
    InvalidAnalysis(String),

    /// A configuration value is missing or invalid (e.g., missing env var).
    ///
    /// Returned at construction time so that misconfiguration surfaces
    /// immediately rather than at the first routed query.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

impl RouterError {
    /// Build an [`RouterError::Engine`] for the named engine.
    pub fn engine(engine: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            engine: engine.into(),
            message: message.into(),
        }
    }

    /// Short, stable label for metrics (`err_type` / `reason` labels).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Engine { .. } => "engine",
            Self::Classifier(_) => "classifier",
            Self::InvalidAnalysis(_) => "invalid_analysis",
            Self::ConfigError(_) => "config",
            Self::Other(_) => "other",
        }
    }
}

/// A single passage returned by a retrieval engine.
///
/// The router never owns passages beyond a single call. It only adds keys in
/// its own namespace (`search_source`, `route_strategy`, `query_complexity`,
/// `route_confidence`) to [`RetrievedPassage::metadata`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Opaque passage text.
    pub content: String,
    /// Arbitrary key-value metadata; insertion order is irrelevant.
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl RetrievedPassage {
    /// Create a passage with empty metadata.
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Builder-style metadata insertion.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Return a metadata value as a string slice, if present and a string.
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(|v| v.as_str())
    }
}
