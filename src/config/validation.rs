//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`RouterConfig`] that cannot
//! be expressed through the type system alone (range checks, non-empty
//! identifiers).
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use super::RouterConfig;

/// Errors arising from configuration parsing, validation, or I/O.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "combined.deadline_ms").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

fn unit_interval(errors: &mut Vec<ConfigError>, field: &str, value: f64) {
    if !(0.0..=1.0).contains(&value) {
        errors.push(ConfigError::InvalidField {
            field: field.into(),
            value: value.to_string(),
            reason: "must be between 0.0 and 1.0".into(),
        });
    }
}

/// Validate all semantic constraints on a [`RouterConfig`].
///
/// Collects every violation before returning so the caller sees the full
/// scope of issues at once.
///
/// # Returns
///
/// - `Ok(())` if all constraints pass.
/// - `Err(Vec<ConfigError>)` with every violation found.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &RouterConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Classifier ───────────────────────────────────────────────────
    if config.classifier.model.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "classifier.model".into(),
            value: String::new(),
            reason: "model name must not be empty".into(),
        });
    }

    if config.classifier.api_key_env.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "classifier.api_key_env".into(),
            value: String::new(),
            reason: "environment variable name must not be empty".into(),
        });
    }

    if !(0.0..=2.0).contains(&config.classifier.temperature) {
        errors.push(ConfigError::InvalidField {
            field: "classifier.temperature".into(),
            value: config.classifier.temperature.to_string(),
            reason: "must be between 0.0 and 2.0".into(),
        });
    }

    if config.classifier.max_tokens == 0 {
        errors.push(ConfigError::InvalidField {
            field: "classifier.max_tokens".into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }

    if config.classifier.timeout_ms == 0 {
        errors.push(ConfigError::InvalidField {
            field: "classifier.timeout_ms".into(),
            value: "0".into(),
            reason: "timeout must be at least 1ms".into(),
        });
    }

    // ── Rules ────────────────────────────────────────────────────────
    unit_interval(
        &mut errors,
        "rules.complexity_threshold",
        config.rules.complexity_threshold,
    );
    unit_interval(
        &mut errors,
        "rules.relation_threshold",
        config.rules.relation_threshold,
    );
    unit_interval(
        &mut errors,
        "rules.fallback_confidence",
        config.rules.fallback_confidence,
    );

    // ── Combined search ──────────────────────────────────────────────
    if config.combined.deadline_ms == 0 {
        errors.push(ConfigError::InvalidField {
            field: "combined.deadline_ms".into(),
            value: "0".into(),
            reason: "deadline must be at least 1ms".into(),
        });
    }

    if config.combined.max_concurrent == 0 {
        errors.push(ConfigError::InvalidField {
            field: "combined.max_concurrent".into(),
            value: "0".into(),
            reason: "must allow at least 1 concurrent search".into(),
        });
    }

    if config.combined.dedup_prefix_chars == 0 {
        errors.push(ConfigError::InvalidField {
            field: "combined.dedup_prefix_chars".into(),
            value: "0".into(),
            reason: "fingerprint must cover at least 1 character".into(),
        });
    }

    // ── Routing ──────────────────────────────────────────────────────
    if config.routing.default_top_k == 0 {
        errors.push(ConfigError::InvalidField {
            field: "routing.default_top_k".into(),
            value: "0".into(),
            reason: "must be at least 1".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
