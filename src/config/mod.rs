//! # Stage: Declarative Router Configuration
//!
//! ## Responsibility
//! Parse and validate TOML router configuration files:
//! ```text
//! cargo run -- --config router.toml
//! ```
//!
//! ## Guarantees
//! - Deterministic: same TOML input always produces the same `RouterConfig`
//! - Validated: all semantic constraints are checked before a config is accepted
//! - Complete: every section and field has a documented default, so an
//!   empty file is a valid configuration
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Constructing clients or engines (that belongs to `llm` / `engine`)
//! - Metrics collection (that belongs to `metrics`)

pub mod loader;
pub mod validation;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// ── Default value functions ──────────────────────────────────────────────

/// Default classification model.
fn default_model() -> String {
    "kimi-k2-0711-preview".to_string()
}

/// Default environment variable holding the classification API key.
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default classification sampling temperature: 0.1.
fn default_temperature() -> f32 {
    0.1
}

/// Default classification reply budget: 800 tokens.
fn default_max_tokens() -> u32 {
    800
}

/// Default classification request timeout: 30 000ms.
fn default_classifier_timeout_ms() -> u64 {
    30_000
}

/// Default keyword-score threshold for the rule-based classifier: 0.3.
fn default_keyword_threshold() -> f64 {
    0.3
}

/// Default confidence reported by the rule-based classifier: 0.6.
fn default_fallback_confidence() -> f64 {
    0.6
}

/// Default combined-search deadline: 30 000ms.
fn default_deadline_ms() -> u64 {
    30_000
}

/// Default number of concurrent combined searches: 20.
fn default_max_concurrent() -> usize {
    20
}

/// Default dedup fingerprint length in characters: 100.
fn default_dedup_prefix_chars() -> usize {
    100
}

/// Default number of passages returned per query: 3.
fn default_top_k() -> usize {
    3
}

/// Default enabled state: true.
fn default_true() -> bool {
    true
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a router instance.
///
/// # Example
///
/// ```toml
/// [classifier]
/// model = "kimi-k2-0711-preview"
/// base_url = "https://api.moonshot.cn/v1"
///
/// [combined]
/// deadline_ms = 30000
/// dedup_prefix_chars = 100
/// ```
///
/// # Panics
///
/// This type never panics during construction or access.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RouterConfig {
    /// Remote classification service settings.
    #[serde(default)]
    pub classifier: ClassifierConfig,
    /// Rule-based fallback classifier constants.
    #[serde(default)]
    pub rules: RuleConfig,
    /// Combined-search executor settings.
    #[serde(default)]
    pub combined: CombinedConfig,
    /// Routing defaults.
    #[serde(default)]
    pub routing: RoutingSection,
    /// Observability: logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ── Classifier ───────────────────────────────────────────────────────────

/// Classification service configuration.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ClassifierConfig {
    /// OpenAI-compatible base URL. `None` reads `OPENAI_BASE_URL` or the default.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Model identifier sent with every classification request.
    #[serde(default = "default_model")]
    pub model: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Maximum tokens in the classification reply.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Request timeout in milliseconds.
    #[serde(default = "default_classifier_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            model: default_model(),
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_classifier_timeout_ms(),
        }
    }
}

// ── Rules ────────────────────────────────────────────────────────────────

/// Rule-based fallback classifier constants.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RuleConfig {
    /// Complexity keyword score above which the query needs graph retrieval.
    #[serde(default = "default_keyword_threshold")]
    pub complexity_threshold: f64,
    /// Relation keyword score above which the query needs graph retrieval.
    #[serde(default = "default_keyword_threshold")]
    pub relation_threshold: f64,
    /// Confidence reported on every rule-based analysis.
    #[serde(default = "default_fallback_confidence")]
    pub fallback_confidence: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            complexity_threshold: default_keyword_threshold(),
            relation_threshold: default_keyword_threshold(),
            fallback_confidence: default_fallback_confidence(),
        }
    }
}

// ── Combined search ──────────────────────────────────────────────────────

/// Combined-search executor configuration.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CombinedConfig {
    /// Shared deadline (ms) for both engine calls.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Maximum combined searches in flight across all callers.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    /// Number of leading content characters used as the dedup fingerprint.
    #[serde(default = "default_dedup_prefix_chars")]
    pub dedup_prefix_chars: usize,
    /// Abort engine tasks still running at the deadline instead of
    /// detaching them.
    #[serde(default)]
    pub abort_on_deadline: bool,
}

impl Default for CombinedConfig {
    fn default() -> Self {
        Self {
            deadline_ms: default_deadline_ms(),
            max_concurrent: default_max_concurrent(),
            dedup_prefix_chars: default_dedup_prefix_chars(),
            abort_on_deadline: false,
        }
    }
}

// ── Routing ──────────────────────────────────────────────────────────────

/// Routing defaults.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct RoutingSection {
    /// Passages returned when the caller does not specify `k`.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

impl Default for RoutingSection {
    fn default() -> Self {
        Self {
            default_top_k: default_top_k(),
        }
    }
}

// ── Observability ────────────────────────────────────────────────────────

/// Observability configuration: logging and metrics.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ObservabilityConfig {
    /// Log output format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Whether Prometheus metrics are registered at startup.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::default(),
            metrics_enabled: default_true(),
        }
    }
}

/// Log output format.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, colorized log output.
    #[default]
    Pretty,
    /// Structured JSON log output for machine consumption.
    Json,
}

impl LogFormat {
    /// Value understood by [`crate::init_tracing`] via `LOG_FORMAT`.
    pub fn as_env_value(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// Export the JSON Schema for `RouterConfig`.
///
/// # Errors
///
/// Returns `serde_json::Error` if schema serialization fails.
///
/// # Panics
///
/// This function never panics.
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(RouterConfig);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_keyword_threshold_returns_0_3() {
        assert!((default_keyword_threshold() - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_default_deadline_ms_returns_30000() {
        assert_eq!(default_deadline_ms(), 30_000);
    }

    #[test]
    fn test_default_dedup_prefix_chars_returns_100() {
        assert_eq!(default_dedup_prefix_chars(), 100);
    }

    #[test]
    fn test_default_top_k_returns_3() {
        assert_eq!(RouterConfig::default().routing.default_top_k, 3);
    }

    #[test]
    fn test_empty_toml_yields_default_config() {
        let config: RouterConfig = toml::from_str("").expect("test: empty toml");
        assert_eq!(config, RouterConfig::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let config: RouterConfig =
            toml::from_str("[combined]\ndeadline_ms = 500\n").expect("test: partial toml");
        assert_eq!(config.combined.deadline_ms, 500);
        assert_eq!(config.combined.max_concurrent, 20);
        assert!(!config.combined.abort_on_deadline);
    }

    #[test]
    fn test_log_format_deserializes_from_snake_case() {
        let fmt: LogFormat = serde_json::from_str("\"json\"").expect("test: deserialization");
        assert_eq!(fmt, LogFormat::Json);
        assert_eq!(fmt.as_env_value(), "json");
    }

    #[test]
    fn test_export_schema_produces_valid_json() {
        let schema = export_schema().expect("test: schema export");
        let parsed: serde_json::Value =
            serde_json::from_str(&schema).expect("test: schema is valid JSON");
        assert!(parsed.get("properties").is_some() || parsed.get("$ref").is_some());
    }
}
