//! Human-readable rendering of a routing decision.

use super::analysis::QueryAnalysis;
use super::strategy::SearchStrategy;

/// Band label for a complexity score.
pub fn complexity_band(score: f64) -> &'static str {
    if score < 0.4 {
        "simple"
    } else if score < 0.8 {
        "moderate"
    } else {
        "complex"
    }
}

/// Band label for a relationship-intensity score.
pub fn relationship_band(score: f64) -> &'static str {
    if score < 0.4 {
        "single entity"
    } else if score < 0.8 {
        "entity relation"
    } else {
        "complex network"
    }
}

fn strategy_summary(strategy: SearchStrategy) -> &'static str {
    match strategy {
        SearchStrategy::Traditional => "direct lookup through the traditional hybrid engine",
        SearchStrategy::GraphRag => "relational reasoning through the graph engine",
        SearchStrategy::Combined => "both engines queried concurrently and merged",
    }
}

/// Render the explanation report for `query` and its analysis.
pub fn render_explanation(query: &str, analysis: &QueryAnalysis) -> String {
    let complexity = analysis.complexity();
    let relationship = analysis.relationship_intensity();
    let strategy = analysis.recommended_strategy();

    format!(
        "Query: {query}\n\
         \n\
         Analysis:\n\
         - complexity: {complexity:.2} ({})\n\
         - relationship intensity: {relationship:.2} ({})\n\
         - reasoning required: {}\n\
         - entity count: {}\n\
         \n\
         Strategy: {strategy} ({})\n\
         Confidence: {:.2}\n\
         Rationale: {}\n",
        complexity_band(complexity),
        relationship_band(relationship),
        if analysis.reasoning_required() { "yes" } else { "no" },
        analysis.entity_count(),
        strategy_summary(strategy),
        analysis.confidence(),
        analysis.rationale(),
    )
}
