//! Retrieval strategy identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::RouterError;

/// The retrieval path selected for a query.
///
/// Closed set: every `match` on this enum is exhaustive, so adding a
/// strategy is a compile-time-visible change at every dispatch site.
///
/// The wire identifiers (serde, [`FromStr`], [`fmt::Display`]) are
/// `hybrid_traditional`, `graph_rag` and `combined`. Anything else is
/// rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SearchStrategy {
    /// Hybrid vector + keyword retrieval; simple lookups.
    #[serde(rename = "hybrid_traditional")]
    Traditional,
    /// Graph retrieval; relational and multi-hop reasoning.
    #[serde(rename = "graph_rag")]
    GraphRag,
    /// Both engines concurrently, merged.
    #[serde(rename = "combined")]
    Combined,
}

impl SearchStrategy {
    /// All strategies in reporting order.
    pub const ALL: [SearchStrategy; 3] = [Self::Traditional, Self::GraphRag, Self::Combined];

    /// Stable wire identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Traditional => "hybrid_traditional",
            Self::GraphRag => "graph_rag",
            Self::Combined => "combined",
        }
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStrategy {
    type Err = RouterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hybrid_traditional" => Ok(Self::Traditional),
            "graph_rag" => Ok(Self::GraphRag),
            "combined" => Ok(Self::Combined),
            other => Err(RouterError::InvalidAnalysis(format!(
                "unknown strategy '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_accepts_wire_identifiers() {
        for strategy in SearchStrategy::ALL {
            let parsed: SearchStrategy = strategy.as_str().parse().expect("test: parse");
            assert_eq!(parsed, strategy);
        }
    }

    #[test]
    fn test_from_str_rejects_unknown_value() {
        let result = "vector_only".parse::<SearchStrategy>();
        assert!(matches!(result, Err(RouterError::InvalidAnalysis(_))));
    }

    #[test]
    fn test_from_str_is_case_sensitive() {
        assert!("GRAPH_RAG".parse::<SearchStrategy>().is_err());
    }

    #[test]
    fn test_serde_uses_wire_identifiers() {
        let json = serde_json::to_string(&SearchStrategy::Traditional).expect("test: serialize");
        assert_eq!(json, "\"hybrid_traditional\"");
        let back: SearchStrategy = serde_json::from_str("\"graph_rag\"").expect("test: parse");
        assert_eq!(back, SearchStrategy::GraphRag);
        assert!(serde_json::from_str::<SearchStrategy>("\"traditional\"").is_err());
    }

    #[test]
    fn test_display_matches_as_str() {
        assert_eq!(SearchStrategy::Combined.to_string(), "combined");
    }
}
