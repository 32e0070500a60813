//! Prometheus metrics for the query router.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`inc_route`, `inc_engine_error`, …) are no-ops if `init_metrics` was never
//! called, so routing is always safe to run and observability simply degrades
//! gracefully.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `router_queries_total` | Counter | `strategy` |
//! | `router_classifier_fallbacks_total` | Counter | `reason` |
//! | `router_engine_errors_total` | Counter | `engine`, `err_type` |
//! | `router_engine_duration_seconds` | Histogram | `engine` |
//! | `router_deadline_exceeded_total` | Counter | `engine` (or `slot_wait`) |

use crate::RouterError;
use prometheus::{
    core::Collector, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

/// All router metrics, bundled so they live in a single [`OnceLock`].
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Routed queries per recommended strategy.
    pub queries_total: CounterVec,
    /// Classifier fallbacks to the rule-based path, by reason.
    pub classifier_fallbacks: CounterVec,
    /// Engine failures by engine and error type.
    pub engine_errors: CounterVec,
    /// Engine search latency.
    pub engine_duration: HistogramVec,
    /// Engine calls abandoned at the combined-search deadline.
    pub deadline_exceeded: CounterVec,
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

fn counter_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    labels: &[&str],
) -> Result<CounterVec, RouterError> {
    let counter = CounterVec::new(Opts::new(name, help), labels)
        .map_err(|e| RouterError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(counter.clone()))
        .map_err(|e| RouterError::Other(format!("metrics registration failed: {e}")))?;
    Ok(counter)
}

fn build_metrics(prefix: &str) -> Result<Metrics, RouterError> {
    let registry = Registry::new();

    let queries_total = counter_vec(
        &registry,
        &format!("{prefix}_queries_total"),
        "Queries routed, by recommended strategy",
        &["strategy"],
    )?;
    let classifier_fallbacks = counter_vec(
        &registry,
        &format!("{prefix}_classifier_fallbacks_total"),
        "Classifications answered by the rule-based fallback",
        &["reason"],
    )?;
    let engine_errors = counter_vec(
        &registry,
        &format!("{prefix}_engine_errors_total"),
        "Retrieval engine failures by engine and type",
        &["engine", "err_type"],
    )?;
    let deadline_exceeded = counter_vec(
        &registry,
        &format!("{prefix}_deadline_exceeded_total"),
        "Engine calls abandoned at the combined-search deadline",
        &["engine"],
    )?;

    let engine_duration = HistogramVec::new(
        HistogramOpts::new(
            format!("{prefix}_engine_duration_seconds"),
            "Retrieval engine search latency",
        ),
        &["engine"],
    )
    .map_err(|e| RouterError::Other(format!("metrics init failed: {e}")))?;
    registry
        .register(Box::new(engine_duration.clone()))
        .map_err(|e| RouterError::Other(format!("metrics registration failed: {e}")))?;

    Ok(Metrics {
        registry,
        queries_total,
        classifier_fallbacks,
        engine_errors,
        engine_duration,
        deadline_exceeded,
    })
}

/// Initialise all router metrics in a private registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`RouterError::Other`] if metric construction or registration fails.
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), RouterError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    // A racing initialiser produces identical descriptors; first one wins.
    let _ = METRICS.set(build_metrics("router")?);
    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

/// Count one routed query under its recommended strategy.
///
/// No-op if metrics have not been initialised.
pub fn inc_route(strategy: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.queries_total.get_metric_with_label_values(&[strategy]) {
            c.inc();
        }
    }
}

/// Count one rule-based classification.
///
/// No-op if metrics have not been initialised.
pub fn inc_classifier_fallback(reason: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.classifier_fallbacks.get_metric_with_label_values(&[reason]) {
            c.inc();
        }
    }
}

/// Count one engine failure.
///
/// No-op if metrics have not been initialised.
pub fn inc_engine_error(engine: &str, err_type: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m
            .engine_errors
            .get_metric_with_label_values(&[engine, err_type])
        {
            c.inc();
        }
    }
}

/// Count one engine call abandoned at the deadline.
///
/// No-op if metrics have not been initialised.
pub fn inc_deadline_exceeded(engine: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.deadline_exceeded.get_metric_with_label_values(&[engine]) {
            c.inc();
        }
    }
}

/// Record the latency of one engine search.
///
/// No-op if metrics have not been initialised.
pub fn record_engine_latency(engine: &str, d: Duration) {
    if let Some(m) = metrics() {
        if let Ok(h) = m.engine_duration.get_metric_with_label_values(&[engine]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
///
/// # Panics
///
/// This function never panics.
pub fn gather_metrics() -> String {
    let families = metrics().map_or_else(Vec::new, |m| m.registry.gather());
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Routed-query counts keyed by strategy label.
///
/// Returns an empty map if metrics have not been initialised.
pub fn route_counts() -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    let Some(m) = metrics() else {
        return counts;
    };

    for family in m.queries_total.collect() {
        for metric in family.get_metric() {
            let strategy = metric
                .get_label()
                .iter()
                .find(|l| l.get_name() == "strategy")
                .map_or("unknown", |l| l.get_value());
            counts.insert(
                strategy.to_string(),
                metric.get_counter().get_value() as u64,
            );
        }
    }
    counts
}
