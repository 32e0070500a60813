//! Query classification.
//!
//! [`QueryClassifier::analyze`] never fails: the remote classification
//! service is tried first and any failure (transport, malformed reply,
//! unknown strategy, out-of-range score) degrades to the deterministic
//! [`RuleBasedClassifier`].

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::analysis::QueryAnalysis;
use super::strategy::SearchStrategy;
use crate::config::RuleConfig;
use crate::llm::CompletionClient;
use crate::metrics;

/// Terms signalling causal or comparative reasoning.
pub const COMPLEXITY_KEYWORDS: [&str; 7] = ["为什么", "如何", "关系", "影响", "原因", "比较", "区别"];

/// Terms signalling entity pairing.
pub const RELATION_KEYWORDS: [&str; 6] = ["配", "搭配", "组合", "相关", "联系", "连接"];

/// Deterministic keyword classifier used when the remote service is
/// unavailable or returns unusable output.
#[derive(Debug, Clone)]
pub struct RuleBasedClassifier {
    config: RuleConfig,
}

impl RuleBasedClassifier {
    /// Create a classifier with the given thresholds.
    pub fn new(config: RuleConfig) -> Self {
        Self { config }
    }

    /// Fraction of `keywords` occurring as substrings of `query`.
    pub fn keyword_score(query: &str, keywords: &[&str]) -> f64 {
        if keywords.is_empty() {
            return 0.0;
        }
        let hits = keywords.iter().filter(|kw| query.contains(*kw)).count();
        hits as f64 / keywords.len() as f64
    }

    /// Classify `query` from keyword hits alone.
    pub fn analyze(&self, query: &str) -> QueryAnalysis {
        let complexity = Self::keyword_score(query, &COMPLEXITY_KEYWORDS);
        let relation = Self::keyword_score(query, &RELATION_KEYWORDS);

        let needs_reasoning = complexity > self.config.complexity_threshold;
        let strategy = if needs_reasoning || relation > self.config.relation_threshold {
            SearchStrategy::GraphRag
        } else {
            SearchStrategy::Traditional
        };

        let entity_count = u32::try_from(query.split_whitespace().count()).unwrap_or(u32::MAX);

        QueryAnalysis::rule_based(
            complexity,
            relation,
            needs_reasoning,
            entity_count,
            strategy,
            self.config.fallback_confidence,
        )
    }
}

impl Default for RuleBasedClassifier {
    fn default() -> Self {
        Self::new(RuleConfig::default())
    }
}

/// Classifier combining the remote service with the keyword fallback.
pub struct QueryClassifier {
    client: Option<Arc<dyn CompletionClient>>,
    rules: RuleBasedClassifier,
}

impl std::fmt::Debug for QueryClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClassifier")
            .field("remote", &self.client.is_some())
            .field("rules", &self.rules)
            .finish()
    }
}

impl QueryClassifier {
    /// Classifier backed by a remote completion service.
    pub fn new(client: Arc<dyn CompletionClient>, rules: RuleConfig) -> Self {
        Self {
            client: Some(client),
            rules: RuleBasedClassifier::new(rules),
        }
    }

    /// Classifier that only ever uses the keyword rules.
    pub fn rule_based_only(rules: RuleConfig) -> Self {
        Self {
            client: None,
            rules: RuleBasedClassifier::new(rules),
        }
    }

    /// Analyse `query`. Never fails.
    pub async fn analyze(&self, query: &str) -> QueryAnalysis {
        let Some(client) = &self.client else {
            metrics::inc_classifier_fallback("no_client");
            return self.rules.analyze(query);
        };

        let prompt = build_prompt(query);
        let outcome = match client.complete(&prompt).await {
            Ok(reply) => {
                debug!(target: "router::classify", reply_len = reply.len(), "classification reply received");
                QueryAnalysis::from_reply(&reply)
            }
            Err(e) => Err(e),
        };

        match outcome {
            Ok(analysis) => {
                info!(
                    target: "router::classify",
                    strategy = %analysis.recommended_strategy(),
                    confidence = analysis.confidence(),
                    "query analysed"
                );
                analysis
            }
            Err(e) => {
                warn!(
                    target: "router::classify",
                    error = %e,
                    "classification failed, using rule-based fallback"
                );
                metrics::inc_classifier_fallback(e.kind());
                self.rules.analyze(query)
            }
        }
    }
}

/// Build the classification prompt: the query plus the scoring rubric and
/// the exact JSON shape expected back.
pub fn build_prompt(query: &str) -> String {
    format!(
        r#"You are the query analysis expert of a RAG system. Analyse the characteristics of the following query.

Query: {query}

Score it along these dimensions:

1. Query complexity (0-1):
   - 0.0-0.3: simple lookup (e.g. 红烧肉怎么做？)
   - 0.4-0.7: moderate (e.g. 川菜有哪些特色菜？)
   - 0.8-1.0: deep reasoning (e.g. 为什么川菜用花椒而不是胡椒？)

2. Relationship intensity (0-1):
   - 0.0-0.3: single entity (e.g. 西红柿的营养价值)
   - 0.4-0.7: relation between entities (e.g. 鸡肉配什么蔬菜？)
   - 0.8-1.0: complex relation network (e.g. 川菜的形成与地理、历史的关系)

3. Reasoning needs: multi-hop reasoning? causal analysis? comparison?

4. Entities: how many explicit entities does the query mention?

Recommend a retrieval strategy:
- hybrid_traditional: simple, direct information lookup
- graph_rag: complex relational reasoning and knowledge discovery
- combined: both strategies are needed

Reply with JSON only:
{{
    "query_complexity": 0.6,
    "relationship_intensity": 0.8,
    "reasoning_required": true,
    "entity_count": 3,
    "recommended_strategy": "graph_rag",
    "confidence": 0.85,
    "reasoning": "the query spans relations between several entities"
}}"#
    )
}
