//! Cache Metrics
//!
//! Counters for observable cache-state transitions, reported through the
//! [`CacheMetrics`] trait as a `BTreeMap`. This is non-authoritative
//! telemetry: nothing in the correctness contract depends on it, but the
//! degraded-path counters (`forced_evictions`, `failed_rehashes`) are the
//! intended way to notice a working set outgrowing its capacity or an
//! index stuck at a high load factor.
//!
//! # Why BTreeMap over HashMap?
//!
//! BTreeMap keeps metric keys in a consistent order, which makes logs,
//! test output, and serialized exports reproducible. With a dozen keys
//! the O(log n) cost is irrelevant.

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};

/// Common interface for metrics reporting.
pub trait CacheMetrics {
    /// Returns all metrics as key-value pairs in deterministic order.
    fn metrics(&self) -> BTreeMap<String, f64>;

    /// Returns the name of the eviction algorithm.
    fn algorithm_name(&self) -> &'static str;
}

/// Counters tracked by the CLOCK cache.
///
/// Misses are derived: `requests - hits`. Every miss that lands on an
/// occupied slot also counts one eviction; evictions that detached a
/// still-pinned entry are additionally counted in `detached_evictions`.
#[derive(Debug, Default, Clone)]
pub struct ClockCacheMetrics {
    /// Total `access` calls that reached the lookup (hits + misses).
    pub requests: u64,

    /// Requests satisfied from a resident entry.
    pub hits: u64,

    /// Entries removed from a slot to make room (freed or detached).
    pub evictions: u64,

    /// Evictions that detached a still-pinned entry instead of freeing it.
    pub detached_evictions: u64,

    /// Degraded-path evictions forced on a slot whose entry was still
    /// pinned or freshly referenced because no better victim existed.
    pub forced_evictions: u64,

    /// Successful hash-index growths.
    pub rehashes: u64,

    /// Index growths abandoned because the new table could not be
    /// allocated; the index keeps serving at the higher load factor.
    pub failed_rehashes: u64,

    /// Total payload bytes copied into the cache on misses.
    pub bytes_written: u64,
}

impl ClockCacheMetrics {
    /// Creates a zeroed counter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request satisfied from a resident entry.
    pub fn record_hit(&mut self) {
        self.requests += 1;
        self.hits += 1;
    }

    /// Records a request that had to install a new entry.
    pub fn record_miss(&mut self) {
        self.requests += 1;
    }

    /// Records an entry leaving its slot; `detached` marks the
    /// pinned-at-eviction case.
    pub fn record_eviction(&mut self, detached: bool) {
        self.evictions += 1;
        if detached {
            self.detached_evictions += 1;
        }
    }

    /// Records the degraded forced-eviction path.
    pub fn record_forced_eviction(&mut self) {
        self.forced_evictions += 1;
    }

    /// Records the outcome of an index growth attempt.
    pub fn record_rehash(&mut self, succeeded: bool) {
        if succeeded {
            self.rehashes += 1;
        } else {
            self.failed_rehashes += 1;
        }
    }

    /// Records payload bytes copied in on a miss.
    pub fn record_insertion(&mut self, bytes: u64) {
        self.bytes_written += bytes;
    }

    /// Hit rate in `[0.0, 1.0]`; 0.0 before any request.
    pub fn hit_rate(&self) -> f64 {
        if self.requests > 0 {
            self.hits as f64 / self.requests as f64
        } else {
            0.0
        }
    }

    /// Converts the counters to a `BTreeMap` for reporting.
    pub fn to_btreemap(&self) -> BTreeMap<String, f64> {
        let mut metrics = BTreeMap::new();
        metrics.insert("requests".to_string(), self.requests as f64);
        metrics.insert("cache_hits".to_string(), self.hits as f64);
        metrics.insert(
            "cache_misses".to_string(),
            (self.requests - self.hits) as f64,
        );
        metrics.insert("hit_rate".to_string(), self.hit_rate());
        metrics.insert("evictions".to_string(), self.evictions as f64);
        metrics.insert(
            "detached_evictions".to_string(),
            self.detached_evictions as f64,
        );
        metrics.insert(
            "forced_evictions".to_string(),
            self.forced_evictions as f64,
        );
        metrics.insert("rehashes".to_string(), self.rehashes as f64);
        metrics.insert("failed_rehashes".to_string(), self.failed_rehashes as f64);
        metrics.insert("bytes_written".to_string(), self.bytes_written as f64);
        metrics
    }
}

impl CacheMetrics for ClockCacheMetrics {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "CLOCK+RB"
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;

    use super::*;

    #[test]
    fn test_new_is_zeroed() {
        let m = ClockCacheMetrics::new();
        assert_eq!(m.requests, 0);
        assert_eq!(m.hit_rate(), 0.0);
        assert_eq!(m.metrics().get("cache_misses"), Some(&0.0));
    }

    #[test]
    fn test_hit_miss_accounting() {
        let mut m = ClockCacheMetrics::new();
        m.record_hit();
        m.record_hit();
        m.record_miss();
        assert_eq!(m.requests, 3);
        assert_eq!(m.hits, 2);
        assert_eq!(m.metrics().get("cache_misses"), Some(&1.0));
        assert!((m.hit_rate() - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_eviction_accounting() {
        let mut m = ClockCacheMetrics::new();
        m.record_eviction(false);
        m.record_eviction(true);
        m.record_forced_eviction();
        assert_eq!(m.evictions, 2);
        assert_eq!(m.detached_evictions, 1);
        assert_eq!(m.forced_evictions, 1);
    }

    #[test]
    fn test_rehash_accounting() {
        let mut m = ClockCacheMetrics::new();
        m.record_rehash(true);
        m.record_rehash(false);
        m.record_rehash(false);
        assert_eq!(m.rehashes, 1);
        assert_eq!(m.failed_rehashes, 2);
    }

    #[test]
    fn test_btreemap_is_deterministic() {
        let mut m = ClockCacheMetrics::new();
        m.record_miss();
        m.record_insertion(64);
        let a: alloc::vec::Vec<String> = m.metrics().keys().cloned().collect();
        let b: alloc::vec::Vec<String> = m.metrics().keys().cloned().collect();
        assert_eq!(a, b);
        assert_eq!(m.metrics().get("bytes_written"), Some(&64.0));
        assert_eq!(m.algorithm_name(), "CLOCK+RB");
    }
}
