//! Multi-query retrieval with candidate merging and result caching.
//!
//! For each call the pipeline derives up to `2 + k` search strings (raw
//! query, optimized description, `k` keywords), ranks the full resource set
//! once per string with each list capped at `n_results`, then merges:
//! concatenate, deduplicate by name keeping the first occurrence, stable
//! re-sort by score, truncate to `n_results`.
//!
//! Retrieval feeds a best-effort context step, so faults never reach the
//! caller: they are logged and the call returns an empty list.

use std::collections::HashSet;
use std::sync::Arc;

use lore_core::{LoreError, RankedResult, RetrievalConfig, ScoringStrategy};
use lore_store::ResourceStore;
use tracing::{debug, warn};

use crate::cache::{CacheKey, QueryCache};
use crate::expansion::{NoExpansion, QueryExpander};
use crate::ranking::Ranker;

/// Retrieval entry point owning its ranker, expander, and cache.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use lore_core::RetrievalConfig;
/// use lore_retrieval::RetrievalPipeline;
/// use lore_store::ResourceStore;
///
/// let store = Arc::new(ResourceStore::in_memory().unwrap());
/// store
///     .insert_resource(
///         "Xylophone Basics",
///         "A xylophone is a percussion instrument played with mallets.",
///         Some(""),
///         Some("music,instruments"),
///     )
///     .unwrap();
///
/// let pipeline = RetrievalPipeline::new(store, &RetrievalConfig::default());
/// let results = pipeline.retrieve("xylophone", 3, 2048);
/// assert_eq!(results[0].name, "Xylophone Basics");
/// assert_eq!(results[0].score, 3.5);
/// ```
pub struct RetrievalPipeline {
    store: Arc<ResourceStore>,
    expander: Box<dyn QueryExpander>,
    ranker: Ranker,
    cache: QueryCache,
    strategy: ScoringStrategy,
    max_keywords: usize,
}

impl RetrievalPipeline {
    /// Build a pipeline over `store` with no query expansion.
    pub fn new(store: Arc<ResourceStore>, config: &RetrievalConfig) -> Self {
        Self {
            store,
            expander: Box::new(NoExpansion),
            ranker: Ranker::default(),
            cache: QueryCache::new(config.cache_capacity),
            strategy: config.strategy,
            max_keywords: config.max_keywords,
        }
    }

    /// Use `expander` to derive additional search strings.
    pub fn with_expander(mut self, expander: impl QueryExpander + 'static) -> Self {
        self.expander = Box::new(expander);
        self
    }

    /// Use a custom ranker.
    pub fn with_ranker(mut self, ranker: Ranker) -> Self {
        self.ranker = ranker;
        self
    }

    /// Use `strategy` for every derived query.
    pub fn with_strategy(mut self, strategy: ScoringStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// The underlying store.
    pub fn store(&self) -> &ResourceStore {
        &self.store
    }

    /// The result cache.
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// The scoring strategy in use.
    pub fn strategy(&self) -> ScoringStrategy {
        self.strategy
    }

    /// Retrieve the best `n_results` resources for `query`, with content cut
    /// to `content_length` characters.
    ///
    /// Results are memoized by the exact argument tuple. An empty query, or
    /// any internal fault, yields an empty list.
    pub fn retrieve(
        &self,
        query: &str,
        n_results: usize,
        content_length: usize,
    ) -> Vec<RankedResult> {
        if query.trim().is_empty() {
            return Vec::new();
        }

        let key = CacheKey::new(query, n_results, content_length);
        match self.cache.get_or_try_compute(key, || {
            self.compute(query, n_results, content_length)
        }) {
            Ok(results) => results.as_ref().clone(),
            Err(e) => {
                warn!(error = %e, query, "retrieval failed, returning no results");
                Vec::new()
            }
        }
    }

    /// The search strings issued for `query`: the raw query first, then the
    /// optimized description, then keywords. Blank and repeated strings are
    /// skipped.
    ///
    /// A failing expander is logged and contributes nothing.
    pub fn derive_queries(&self, query: &str) -> Vec<String> {
        let mut derived = vec![query.to_string()];

        match self.expander.optimized_description(query) {
            Ok(Some(description)) => derived.push(description),
            Ok(None) => {}
            Err(e) => warn!(error = %e, "query description unavailable"),
        }

        match self.expander.keywords(query, self.max_keywords) {
            Ok(keywords) => derived.extend(keywords.into_iter().take(self.max_keywords)),
            Err(e) => warn!(error = %e, "query keywords unavailable"),
        }

        let mut seen = HashSet::new();
        derived.retain(|q| {
            let q = q.trim();
            !q.is_empty() && seen.insert(q.to_string())
        });
        derived
    }

    fn compute(
        &self,
        query: &str,
        n_results: usize,
        content_length: usize,
    ) -> Result<Vec<RankedResult>, LoreError> {
        let resources = self.store.list_resources()?;
        let derived = self.derive_queries(query);

        let candidates: Vec<Vec<RankedResult>> = derived
            .iter()
            .map(|q| {
                self.ranker
                    .rank(&resources, q, self.strategy, n_results, content_length)
            })
            .collect();

        let merged = merge_candidates(candidates, n_results);
        debug!(
            query,
            derived = derived.len(),
            population = resources.len(),
            returned = merged.len(),
            "computed retrieval"
        );
        Ok(merged)
    }
}

/// Concatenate per-query lists, keep the first entry seen for each name,
/// stable-sort by descending score, and keep the top `n_results`.
pub fn merge_candidates(lists: Vec<Vec<RankedResult>>, n_results: usize) -> Vec<RankedResult> {
    let mut seen = HashSet::new();
    let mut merged: Vec<RankedResult> = lists
        .into_iter()
        .flatten()
        .filter(|r| seen.insert(r.name.clone()))
        .collect();

    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(n_results);
    merged
}

/// Render results as `name: content` lines for a downstream prompt.
///
/// # Examples
///
/// ```
/// use lore_core::RankedResult;
/// use lore_retrieval::format_context;
///
/// let results = vec![RankedResult {
///     name: "Xylophone Basics".into(),
///     content: "Played with mallets.".into(),
///     description: String::new(),
///     tags: String::new(),
///     score: 3.5,
/// }];
/// assert_eq!(format_context(&results), "Xylophone Basics: Played with mallets.");
/// ```
pub fn format_context(results: &[RankedResult]) -> String {
    results
        .iter()
        .map(|r| format!("{}: {}", r.name, r.content))
        .collect::<Vec<_>>()
        .join("\n")
}
