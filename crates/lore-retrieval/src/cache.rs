//! Bounded memo of retrieval results keyed by the exact call arguments.
//!
//! There is deliberately no hook tying entries to store writes: once a key is
//! cached, the same arguments return the same result until the entry is
//! evicted, even if resources have been inserted or retagged since.

use std::sync::Arc;

use lore_core::{LoreError, RankedResult};
use moka::sync::Cache;

/// The full argument tuple of a retrieval call.
///
/// Distinct tuples never share an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub query: String,
    pub n_results: usize,
    pub content_length: usize,
}

impl CacheKey {
    pub fn new(query: impl Into<String>, n_results: usize, content_length: usize) -> Self {
        Self {
            query: query.into(),
            n_results,
            content_length,
        }
    }
}

/// Capacity-bounded result cache.
///
/// Concurrent lookups of the same missing key run the computation once; the
/// other callers wait for and share its result.
///
/// # Examples
///
/// ```
/// use lore_retrieval::{CacheKey, QueryCache};
///
/// let cache = QueryCache::new(16);
/// let key = CacheKey::new("xylophone", 3, 2048);
/// let first = cache.get_or_try_compute(key.clone(), || Ok(Vec::new())).unwrap();
/// assert!(first.is_empty());
/// assert!(cache.get(&key).is_some());
/// ```
pub struct QueryCache {
    entries: Cache<CacheKey, Arc<Vec<RankedResult>>>,
    capacity: u64,
}

impl QueryCache {
    /// Create a cache holding at most `capacity` entries.
    pub fn new(capacity: u64) -> Self {
        Self {
            entries: Cache::builder().max_capacity(capacity).build(),
            capacity,
        }
    }

    /// The cached result for `key`, if present.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<Vec<RankedResult>>> {
        self.entries.get(key)
    }

    /// Return the cached result for `key`, or run `compute` and cache its
    /// output.
    ///
    /// Failed computations are not cached, so a later call retries.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `compute`, shared with any concurrent
    /// callers that were waiting on the same key.
    pub fn get_or_try_compute<F>(
        &self,
        key: CacheKey,
        compute: F,
    ) -> Result<Arc<Vec<RankedResult>>, Arc<LoreError>>
    where
        F: FnOnce() -> Result<Vec<RankedResult>, LoreError>,
    {
        self.entries.try_get_with(key, || compute().map(Arc::new))
    }

    /// Number of live entries, after applying pending evictions.
    pub fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks();
        self.entries.entry_count()
    }

    /// The configured maximum entry count.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;

    fn result(name: &str) -> RankedResult {
        RankedResult {
            name: name.into(),
            content: String::new(),
            description: String::new(),
            tags: String::new(),
            score: 1.0,
        }
    }

    #[test]
    fn second_lookup_skips_compute() {
        let cache = QueryCache::new(8);
        let calls = Cell::new(0);
        let key = CacheKey::new("q", 3, 2048);

        for _ in 0..3 {
            let out = cache
                .get_or_try_compute(key.clone(), || {
                    calls.set(calls.get() + 1);
                    Ok(vec![result("a")])
                })
                .unwrap();
            assert_eq!(out[0].name, "a");
        }
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn keys_differ_by_every_argument() {
        let cache = QueryCache::new(8);
        let keys = [
            CacheKey::new("q", 3, 2048),
            CacheKey::new("Q", 3, 2048),
            CacheKey::new("q", 4, 2048),
            CacheKey::new("q", 3, 100),
        ];
        for (i, key) in keys.iter().enumerate() {
            cache
                .get_or_try_compute(key.clone(), || Ok(vec![result(&i.to_string())]))
                .unwrap();
        }
        for (i, key) in keys.iter().enumerate() {
            assert_eq!(cache.get(key).unwrap()[0].name, i.to_string());
        }
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = QueryCache::new(8);
        let key = CacheKey::new("q", 3, 2048);

        let err = cache
            .get_or_try_compute(key.clone(), || Err(LoreError::Storage("offline".into())))
            .unwrap_err();
        assert!(err.to_string().contains("offline"));
        assert!(cache.get(&key).is_none());

        let ok = cache
            .get_or_try_compute(key, || Ok(vec![result("recovered")]))
            .unwrap();
        assert_eq!(ok[0].name, "recovered");
    }

    #[test]
    fn stays_within_capacity() {
        let cache = QueryCache::new(4);
        for i in 0..50 {
            cache
                .get_or_try_compute(CacheKey::new(format!("q{i}"), 3, 2048), || Ok(Vec::new()))
                .unwrap();
        }
        assert!(cache.entry_count() <= cache.capacity());
    }
}
