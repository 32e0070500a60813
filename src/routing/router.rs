//! Query router entry point.
//!
//! The [`IntelligentQueryRouter`] ties the classifier, the strategy
//! dispatcher, the combined-search executor, the annotator and the statistics
//! tracker into a single `route_query` call.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use super::analysis::QueryAnalysis;
use super::annotate::{annotate, SOURCE_GRAPH, SOURCE_TRADITIONAL};
use super::classifier::QueryClassifier;
use super::combined::CombinedSearchExecutor;
use super::explain::render_explanation;
use super::stats::{RoutingStatistics, StatsTracker};
use super::strategy::SearchStrategy;
use crate::config::RouterConfig;
use crate::engine::RetrievalEngine;
use crate::llm::OpenAiChatClient;
use crate::{metrics, RetrievedPassage, RouterError};

/// Intelligent query router.
///
/// Classifies each query, dispatches it to the traditional engine, the graph
/// engine, or combined search, stamps routing metadata on the results and
/// counts the decision.
///
/// Thread-safe: share it behind an `Arc` and call `route_query` from any
/// number of tasks.
///
/// # Panics
///
/// This type and its methods never panic.
pub struct IntelligentQueryRouter {
    traditional: Arc<dyn RetrievalEngine>,
    graph: Arc<dyn RetrievalEngine>,
    classifier: QueryClassifier,
    combined: CombinedSearchExecutor,
    stats: StatsTracker,
    default_top_k: usize,
}

impl std::fmt::Debug for IntelligentQueryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntelligentQueryRouter")
            .field("classifier", &self.classifier)
            .field("combined", &self.combined)
            .field("default_top_k", &self.default_top_k)
            .finish()
    }
}

impl IntelligentQueryRouter {
    /// Create a router over the two engines with an explicit classifier.
    ///
    /// # Arguments
    ///
    /// * `traditional` — Hybrid keyword/vector engine; also the fallback path.
    /// * `graph` — Graph-based retrieval engine.
    /// * `classifier` — Query classifier (remote with rule fallback, or rules only).
    /// * `config` — Combined-search and routing settings.
    ///
    /// # Panics
    ///
    /// This function never panics.
    pub fn new(
        traditional: Arc<dyn RetrievalEngine>,
        graph: Arc<dyn RetrievalEngine>,
        classifier: QueryClassifier,
        config: &RouterConfig,
    ) -> Self {
        let combined =
            CombinedSearchExecutor::new(Arc::clone(&graph), Arc::clone(&traditional), &config.combined);
        Self {
            traditional,
            graph,
            classifier,
            combined,
            stats: StatsTracker::new(),
            default_top_k: config.routing.default_top_k,
        }
    }

    /// Create a router whose classifier calls the OpenAI-compatible service
    /// described by `config.classifier`.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::ConfigError`] if the API key variable named by
    /// `config.classifier.api_key_env` is unset or empty.
    pub fn from_config(
        traditional: Arc<dyn RetrievalEngine>,
        graph: Arc<dyn RetrievalEngine>,
        config: &RouterConfig,
    ) -> Result<Self, RouterError> {
        let client = OpenAiChatClient::from_config(&config.classifier)?;
        let classifier = QueryClassifier::new(Arc::new(client), config.rules.clone());
        Ok(Self::new(traditional, graph, classifier, config))
    }

    /// Route `query` with the configured default `k` (3 unless overridden).
    ///
    /// # Errors
    ///
    /// See [`IntelligentQueryRouter::route_query`].
    pub async fn route(
        &self,
        query: &str,
    ) -> Result<(Vec<RetrievedPassage>, QueryAnalysis), RouterError> {
        self.route_query(query, self.default_top_k).await
    }

    /// Classify, dispatch, annotate and count one query.
    ///
    /// Statistics are recorded once per call, right after classification,
    /// so a call that later fails still counts toward its strategy.
    ///
    /// # Errors
    ///
    /// Returns [`RouterError::Engine`] only when the selected path failed
    /// and the single traditional re-dispatch failed as well.
    pub async fn route_query(
        &self,
        query: &str,
        k: usize,
    ) -> Result<(Vec<RetrievedPassage>, QueryAnalysis), RouterError> {
        let started = Instant::now();
        let analysis = self.classifier.analyze(query).await;
        let strategy = analysis.recommended_strategy();

        self.stats.record_route(strategy);
        metrics::inc_route(strategy.as_str());

        info!(
            target: "router::dispatch",
            strategy = %strategy,
            confidence = analysis.confidence(),
            query_chars = query.chars().count(),
            k,
            "routing query"
        );

        let mut passages = match self.dispatch(query, &analysis, k).await {
            Ok(passages) => passages,
            Err(primary) => {
                warn!(
                    target: "router::dispatch",
                    strategy = %strategy,
                    error = %primary,
                    "dispatch failed, re-routing to traditional engine"
                );
                match self.search_direct(SOURCE_TRADITIONAL, &self.traditional, query, k).await {
                    Ok(passages) => passages,
                    Err(fallback) => {
                        error!(
                            target: "router::dispatch",
                            primary = %primary,
                            error = %fallback,
                            "traditional fallback failed"
                        );
                        return Err(fallback);
                    }
                }
            }
        };

        annotate(&mut passages, &analysis);

        info!(
            target: "router::dispatch",
            strategy = %strategy,
            results = passages.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "query routed"
        );
        Ok((passages, analysis))
    }

    /// Execute the path selected by `analysis` without any fallback.
    ///
    /// # Errors
    ///
    /// Returns the engine's error for the traditional and graph paths.
    /// Combined search never fails.
    pub async fn dispatch(
        &self,
        query: &str,
        analysis: &QueryAnalysis,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, RouterError> {
        match analysis.recommended_strategy() {
            SearchStrategy::Traditional => {
                self.search_direct(SOURCE_TRADITIONAL, &self.traditional, query, k)
                    .await
            }
            SearchStrategy::GraphRag => self.search_direct(SOURCE_GRAPH, &self.graph, query, k).await,
            SearchStrategy::Combined => Ok(self.combined.search(query, k).await),
        }
    }

    /// Run combined search directly, bypassing classification and statistics.
    pub async fn combined_search(&self, query: &str, k: usize) -> Vec<RetrievedPassage> {
        self.combined.search(query, k).await
    }

    /// Classify `query` again and render the decision as a report.
    ///
    /// Does not touch routing statistics.
    pub async fn explain_routing(&self, query: &str) -> String {
        let analysis = self.classifier.analyze(query).await;
        render_explanation(query, &analysis)
    }

    /// Snapshot of the routing counters.
    pub fn statistics(&self) -> RoutingStatistics {
        self.stats.snapshot()
    }

    async fn search_direct(
        &self,
        engine_name: &'static str,
        engine: &Arc<dyn RetrievalEngine>,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedPassage>, RouterError> {
        let started = Instant::now();
        let result = engine.search(query, k).await;
        metrics::record_engine_latency(engine_name, started.elapsed());
        if let Err(e) = &result {
            metrics::inc_engine_error(engine_name, e.kind());
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;
    use crate::engine::StaticEngine;
    use crate::llm::ScriptedClient;
    use crate::routing::annotate::{ROUTE_CONFIDENCE_KEY, ROUTE_STRATEGY_KEY, SEARCH_SOURCE_KEY};
    use async_trait::async_trait;

    struct FailingEngine;

    #[async_trait]
    impl RetrievalEngine for FailingEngine {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<RetrievedPassage>, RouterError> {
            Err(RouterError::engine("failing", "backend down"))
        }
    }

    fn reply(strategy: &str) -> String {
        format!(
            r#"{{"query_complexity":0.7,"relationship_intensity":0.6,"reasoning_required":true,
                "entity_count":2,"recommended_strategy":"{strategy}","confidence":0.9,"reasoning":"test"}}"#
        )
    }

    fn scripted(strategy: &str) -> QueryClassifier {
        QueryClassifier::new(
            Arc::new(ScriptedClient::unavailable().with_reply(reply(strategy))),
            RuleConfig::default(),
        )
    }

    fn router_with(
        traditional: Arc<dyn RetrievalEngine>,
        graph: Arc<dyn RetrievalEngine>,
        classifier: QueryClassifier,
    ) -> IntelligentQueryRouter {
        IntelligentQueryRouter::new(traditional, graph, classifier, &RouterConfig::default())
    }

    fn trad() -> Arc<dyn RetrievalEngine> {
        Arc::new(StaticEngine::new("traditional", &["t0", "t1", "t2"]))
    }

    fn graph() -> Arc<dyn RetrievalEngine> {
        Arc::new(StaticEngine::new("graph_rag", &["g0", "g1", "g2"]))
    }

    #[tokio::test]
    async fn test_route_query_traditional_path() {
        let router = router_with(
            trad(),
            graph(),
            QueryClassifier::rule_based_only(RuleConfig::default()),
        );
        let (passages, analysis) = router
            .route_query("红烧肉怎么做？", 3)
            .await
            .expect("test: route");
        assert_eq!(analysis.recommended_strategy(), SearchStrategy::Traditional);
        assert_eq!(passages.len(), 3);
        assert_eq!(passages[0].content, "t0");
        assert_eq!(passages[0].meta_str(ROUTE_STRATEGY_KEY), Some("hybrid_traditional"));
        assert_eq!(passages[0].metadata[ROUTE_CONFIDENCE_KEY].as_f64(), Some(0.6));
        assert!(passages[0].metadata.get(SEARCH_SOURCE_KEY).is_none());
    }

    #[tokio::test]
    async fn test_route_query_graph_path() {
        let router = router_with(trad(), graph(), scripted("graph_rag"));
        let (passages, _) = router.route_query("q", 2).await.expect("test: route");
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].content, "g0");
        assert_eq!(passages[0].meta_str(ROUTE_STRATEGY_KEY), Some("graph_rag"));
    }

    #[tokio::test]
    async fn test_route_query_combined_path_tags_sources() {
        let router = router_with(trad(), graph(), scripted("combined"));
        let (passages, _) = router.route_query("q", 4).await.expect("test: route");
        let contents: Vec<_> = passages.iter().map(|p| p.content.as_str()).collect();
        assert_eq!(contents, vec!["g0", "t0", "g1", "t1"]);
        for p in &passages {
            assert!(p.meta_str(SEARCH_SOURCE_KEY).is_some());
            assert_eq!(p.meta_str(ROUTE_STRATEGY_KEY), Some("combined"));
        }
    }

    #[tokio::test]
    async fn test_graph_failure_falls_back_to_traditional() {
        let router = router_with(trad(), Arc::new(FailingEngine), scripted("graph_rag"));
        let (passages, analysis) = router.route_query("q", 2).await.expect("test: route");
        assert_eq!(analysis.recommended_strategy(), SearchStrategy::GraphRag);
        assert_eq!(passages[0].content, "t0");
        assert_eq!(passages[0].meta_str(ROUTE_STRATEGY_KEY), Some("graph_rag"));
        assert_eq!(router.statistics().graph_rag_count, 1);
    }

    #[tokio::test]
    async fn test_both_paths_failing_propagates_engine_error() {
        let router = router_with(
            Arc::new(FailingEngine),
            Arc::new(FailingEngine),
            scripted("graph_rag"),
        );
        let result = router.route_query("q", 2).await;
        assert!(matches!(result, Err(RouterError::Engine { .. })));
        assert_eq!(router.statistics().total_queries, 1);
    }

    #[tokio::test]
    async fn test_combined_with_failing_engines_returns_empty() {
        let router = router_with(
            Arc::new(FailingEngine),
            Arc::new(FailingEngine),
            scripted("combined"),
        );
        let (passages, _) = router.route_query("q", 3).await.expect("test: route");
        assert!(passages.is_empty());
    }

    #[tokio::test]
    async fn test_explain_routing_does_not_touch_statistics() {
        let router = router_with(
            trad(),
            graph(),
            QueryClassifier::rule_based_only(RuleConfig::default()),
        );
        let report = router.explain_routing("红烧肉怎么做？").await;
        assert!(report.contains("hybrid_traditional"));
        assert_eq!(router.statistics().total_queries, 0);
    }

    #[tokio::test]
    async fn test_route_uses_default_top_k() {
        let router = router_with(
            Arc::new(StaticEngine::new("traditional", &["a", "b", "c", "d", "e"])),
            graph(),
            QueryClassifier::rule_based_only(RuleConfig::default()),
        );
        let (passages, _) = router.route("红烧肉怎么做？").await.expect("test: route");
        assert_eq!(passages.len(), 3);
    }
}
