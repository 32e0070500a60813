//! Routing statistics.
//!
//! Counts how many queries were routed to each strategy. All four counters
//! live behind one mutex so every update is a single synchronized step and
//! `traditional + graph_rag + combined == total` holds in every snapshot,
//! even under concurrent callers.

use serde::Serialize;
use std::sync::Mutex;

use super::strategy::SearchStrategy;

#[derive(Debug, Default, Clone, Copy)]
struct Counters {
    total: u64,
    traditional: u64,
    graph_rag: u64,
    combined: u64,
}

/// Process-wide routing counters owned by one router.
///
/// Exposes only increment and snapshot; there is no reset.
#[derive(Debug, Default)]
pub struct StatsTracker {
    counters: Mutex<Counters>,
}

impl StatsTracker {
    /// Tracker with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one routed query.
    pub fn record_route(&self, strategy: SearchStrategy) {
        // A poisoned lock still holds consistent counters: every mutation
        // below completes before the guard drops.
        let mut c = self.counters.lock().unwrap_or_else(|e| e.into_inner());
        c.total += 1;
        match strategy {
            SearchStrategy::Traditional => c.traditional += 1,
            SearchStrategy::GraphRag => c.graph_rag += 1,
            SearchStrategy::Combined => c.combined += 1,
        }
    }

    /// Consistent point-in-time copy of the counters.
    pub fn snapshot(&self) -> RoutingStatistics {
        let c = *self.counters.lock().unwrap_or_else(|e| e.into_inner());
        RoutingStatistics::from_counters(c)
    }
}

/// Snapshot of routing counters with derived ratios.
///
/// Ratios are `None` while `total_queries == 0`; they are never computed by
/// dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingStatistics {
    /// Queries routed since construction.
    pub total_queries: u64,
    /// Queries routed to the traditional engine.
    pub traditional_count: u64,
    /// Queries routed to the graph engine.
    pub graph_rag_count: u64,
    /// Queries routed to combined search.
    pub combined_count: u64,
    /// `traditional_count / total_queries`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub traditional_ratio: Option<f64>,
    /// `graph_rag_count / total_queries`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graph_rag_ratio: Option<f64>,
    /// `combined_count / total_queries`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_ratio: Option<f64>,
}

impl RoutingStatistics {
    fn from_counters(c: Counters) -> Self {
        let ratio = |n: u64| (c.total > 0).then(|| n as f64 / c.total as f64);
        Self {
            total_queries: c.total,
            traditional_count: c.traditional,
            graph_rag_count: c.graph_rag,
            combined_count: c.combined,
            traditional_ratio: ratio(c.traditional),
            graph_rag_ratio: ratio(c.graph_rag),
            combined_ratio: ratio(c.combined),
        }
    }

    /// Count for one strategy.
    pub fn count(&self, strategy: SearchStrategy) -> u64 {
        match strategy {
            SearchStrategy::Traditional => self.traditional_count,
            SearchStrategy::GraphRag => self.graph_rag_count,
            SearchStrategy::Combined => self.combined_count,
        }
    }
}
