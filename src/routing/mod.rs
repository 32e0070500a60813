//! # Stage: Query Routing Intelligence
//!
//! ## Responsibility
//! Decide, per query, which retrieval path serves it: the traditional
//! hybrid engine for direct lookups, the graph engine for relational
//! reasoning, or both engines concurrently with a merged result. Annotate
//! the results with the decision and count it.
//!
//! ## Guarantees
//! - Total classification: `QueryClassifier::analyze` always returns a
//!   valid analysis; remote failures degrade to the keyword rules.
//! - Closed strategy set: every dispatch is an exhaustive match over
//!   [`SearchStrategy`].
//! - Bounded: combined search returns within its configured deadline and
//!   never fails.
//! - Deterministic merge: combined output depends only on the two ranked
//!   lists, not on which engine answered first.
//! - Consistent counters: per-strategy counts always sum to the total.
//!
//! ## NOT Responsible For
//! - Implementing the retrieval engines (that belongs to `engine`)
//! - Talking HTTP to the classification service (that belongs to `llm`)
//! - Generating answers from the retrieved passages

pub mod analysis;
pub mod annotate;
pub mod classifier;
pub mod combined;
pub mod explain;
pub mod router;
pub mod stats;
pub mod strategy;

// Re-exports for convenience
pub use analysis::QueryAnalysis;
pub use classifier::{QueryClassifier, RuleBasedClassifier};
pub use combined::CombinedSearchExecutor;
pub use router::IntelligentQueryRouter;
pub use stats::{RoutingStatistics, StatsTracker};
pub use strategy::SearchStrategy;
