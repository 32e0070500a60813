//! Provenance and routing metadata stamped onto outgoing passages.

use super::analysis::QueryAnalysis;
use crate::RetrievedPassage;

/// Metadata key: which engine produced a passage in combined search.
pub const SEARCH_SOURCE_KEY: &str = "search_source";
/// Metadata key: strategy that drove the routing decision.
pub const ROUTE_STRATEGY_KEY: &str = "route_strategy";
/// Metadata key: complexity score of the query.
pub const QUERY_COMPLEXITY_KEY: &str = "query_complexity";
/// Metadata key: classification confidence.
pub const ROUTE_CONFIDENCE_KEY: &str = "route_confidence";

/// `search_source` value for graph-engine passages.
pub const SOURCE_GRAPH: &str = "graph_rag";
/// `search_source` value for traditional-engine passages.
pub const SOURCE_TRADITIONAL: &str = "traditional";

/// Stamp routing metadata onto every passage.
///
/// Only the router-owned keys are written; every other metadata entry is
/// left exactly as the engine returned it.
pub fn annotate(passages: &mut [RetrievedPassage], analysis: &QueryAnalysis) {
    for passage in passages.iter_mut() {
        let meta = &mut passage.metadata;
        meta.insert(
            ROUTE_STRATEGY_KEY.to_string(),
            analysis.recommended_strategy().as_str().into(),
        );
        meta.insert(
            QUERY_COMPLEXITY_KEY.to_string(),
            analysis.complexity().into(),
        );
        meta.insert(
            ROUTE_CONFIDENCE_KEY.to_string(),
            analysis.confidence().into(),
        );
    }
}
