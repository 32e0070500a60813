//! Combined-search executor.
//!
//! Runs the graph and traditional engines concurrently under one shared
//! deadline, then merges their ranked lists round-robin (graph first at each
//! index), deduplicates by a content-prefix fingerprint, and truncates to `k`.
//!
//! ## Guarantees
//! - Bounded: returns once both engines finish or the deadline passes.
//! - Infallible: an engine that errors, panics, or misses the deadline
//!   contributes an empty list; the search itself never fails.
//! - Deterministic: the merge reads only the two ranked lists, never the
//!   order in which the engine calls completed.
//!
//! Engine tasks still running at the deadline are detached, not cancelled:
//! they run to completion in the background and their results are dropped.
//! Set `abort_on_deadline` to abort them at their next await point instead.
//!
//! At most `max_concurrent` searches have engine tasks alive at once. A
//! slot is held until both of its tasks end, detached ones included, so
//! late engines keep their slot busy.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::annotate::{SEARCH_SOURCE_KEY, SOURCE_GRAPH, SOURCE_TRADITIONAL};
use crate::config::CombinedConfig;
use crate::engine::RetrievalEngine;
use crate::{metrics, RetrievedPassage};

/// `engine` label used when the deadline passes while waiting for a slot.
pub const SLOT_WAIT: &str = "slot_wait";

/// Split `k` between the engines as `(graph_k, traditional_k)`.
///
/// `traditional_k = max(1, k / 2)` and the graph engine gets the remainder,
/// so `k = 1` yields `(0, 1)`.
pub fn split_k(k: usize) -> (usize, usize) {
    let traditional_k = (k / 2).max(1);
    (k.saturating_sub(traditional_k), traditional_k)
}

/// Dedup key over the first `prefix_chars` characters of `content`.
///
/// Two passages sharing that prefix collide even if they differ later.
pub fn fingerprint(content: &str, prefix_chars: usize) -> u64 {
    let mut hasher = DefaultHasher::new();
    for c in content.chars().take(prefix_chars) {
        c.hash(&mut hasher);
    }
    hasher.finish()
}

/// Interleave `graph` and `traditional` by rank (graph first at each
/// index), drop later passages whose fingerprint was already seen, tag
/// survivors with `search_source`, and keep at most `k`.
pub fn merge_round_robin(
    graph: Vec<RetrievedPassage>,
    traditional: Vec<RetrievedPassage>,
    k: usize,
    prefix_chars: usize,
) -> Vec<RetrievedPassage> {
    let rounds = graph.len().max(traditional.len());
    let mut graph = graph.into_iter();
    let mut traditional = traditional.into_iter();

    let mut seen = HashSet::new();
    let mut merged = Vec::new();

    for _ in 0..rounds {
        for (source, next) in [
            (SOURCE_GRAPH, graph.next()),
            (SOURCE_TRADITIONAL, traditional.next()),
        ] {
            let Some(mut passage) = next else { continue };
            if seen.insert(fingerprint(&passage.content, prefix_chars)) {
                passage
                    .metadata
                    .insert(SEARCH_SOURCE_KEY.to_string(), source.into());
                merged.push(passage);
            }
        }
    }

    merged.truncate(k);
    merged
}

/// Fans a query out to both engines and merges the results.
pub struct CombinedSearchExecutor {
    graph: Arc<dyn RetrievalEngine>,
    traditional: Arc<dyn RetrievalEngine>,
    slots: Arc<Semaphore>,
    deadline: Duration,
    prefix_chars: usize,
    abort_on_deadline: bool,
}

impl std::fmt::Debug for CombinedSearchExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombinedSearchExecutor")
            .field("deadline", &self.deadline)
            .field("prefix_chars", &self.prefix_chars)
            .field("available_slots", &self.slots.available_permits())
            .field("abort_on_deadline", &self.abort_on_deadline)
            .finish()
    }
}

impl CombinedSearchExecutor {
    /// Create an executor over the two engines.
    pub fn new(
        graph: Arc<dyn RetrievalEngine>,
        traditional: Arc<dyn RetrievalEngine>,
        config: &CombinedConfig,
    ) -> Self {
        Self {
            graph,
            traditional,
            slots: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            deadline: Duration::from_millis(config.deadline_ms),
            prefix_chars: config.dedup_prefix_chars,
            abort_on_deadline: config.abort_on_deadline,
        }
    }

    /// Search both engines concurrently and return at most `k` merged,
    /// deduplicated passages. Never fails.
    ///
    /// The deadline also covers waiting for a concurrency slot: a caller
    /// that is not granted one in time gets an empty result.
    pub async fn search(&self, query: &str, k: usize) -> Vec<RetrievedPassage> {
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + self.deadline;

        let slot = Arc::clone(&self.slots).acquire_owned();
        let permit = match tokio::time::timeout_at(deadline, slot).await {
            Ok(Ok(permit)) => Some(Arc::new(permit)),
            // Never closed; proceed unthrottled if that changes.
            Ok(Err(_)) => None,
            Err(_) => {
                warn!(
                    target: "router::combined",
                    deadline_ms = self.deadline.as_millis() as u64,
                    "no combined-search slot before deadline"
                );
                metrics::inc_deadline_exceeded(SLOT_WAIT);
                return Vec::new();
            }
        };

        let (graph_k, traditional_k) = split_k(k);

        // Both tasks share the slot; it frees once neither is still running.
        let mut graph_task = spawn_search(
            SOURCE_GRAPH,
            Arc::clone(&self.graph),
            query,
            graph_k,
            permit.clone(),
        );
        let mut traditional_task = spawn_search(
            SOURCE_TRADITIONAL,
            Arc::clone(&self.traditional),
            query,
            traditional_k,
            permit,
        );

        let graph_results = self.collect(SOURCE_GRAPH, &mut graph_task, deadline).await;
        let traditional_results = self
            .collect(SOURCE_TRADITIONAL, &mut traditional_task, deadline)
            .await;

        let (graph_len, traditional_len) = (graph_results.len(), traditional_results.len());
        let merged = merge_round_robin(graph_results, traditional_results, k, self.prefix_chars);

        info!(
            target: "router::combined",
            k,
            graph_k,
            traditional_k,
            graph_len,
            traditional_len,
            merged = merged.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "combined search finished"
        );
        merged
    }

    /// Wait for one engine task until the shared deadline.
    async fn collect(
        &self,
        engine: &'static str,
        task: &mut JoinHandle<Vec<RetrievedPassage>>,
        deadline: tokio::time::Instant,
    ) -> Vec<RetrievedPassage> {
        match tokio::time::timeout_at(deadline, &mut *task).await {
            Ok(Ok(passages)) => passages,
            Ok(Err(e)) => {
                warn!(target: "router::combined", engine, error = %e, "engine task did not complete");
                metrics::inc_engine_error(engine, "join");
                Vec::new()
            }
            Err(_) => {
                warn!(
                    target: "router::combined",
                    engine,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "engine missed combined-search deadline"
                );
                metrics::inc_deadline_exceeded(engine);
                if self.abort_on_deadline {
                    task.abort();
                }
                Vec::new()
            }
        }
    }
}

/// Spawn one engine search; failures become an empty result.
fn spawn_search(
    engine_name: &'static str,
    engine: Arc<dyn RetrievalEngine>,
    query: &str,
    k: usize,
    slot: Option<Arc<OwnedSemaphorePermit>>,
) -> JoinHandle<Vec<RetrievedPassage>> {
    let query = query.to_owned();
    tokio::spawn(async move {
        let _slot = slot;
        let started = Instant::now();
        let result = engine.search(&query, k).await;
        metrics::record_engine_latency(engine_name, started.elapsed());

        match result {
            Ok(passages) => {
                debug!(target: "router::combined", engine = engine_name, count = passages.len(), "engine search done");
                passages
            }
            Err(e) => {
                warn!(target: "router::combined", engine = engine_name, error = %e, "engine search failed");
                metrics::inc_engine_error(engine_name, e.kind());
                Vec::new()
            }
        }
    })
}
