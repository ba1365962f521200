//! CLOCK Cache Engine
//!
//! The facade coordinating the slot table, the hash index, and the
//! entry lifecycle under a single mutex. Every [`access`](ClockCache::access)
//! executes its full lookup/evict/install sequence while holding the
//! lock, so no partial state is ever observable and the reference bit,
//! pin decisions, and clock hand advance strictly sequentially.
//!
//! # Why one Mutex instead of RwLock or sharding?
//!
//! Every access mutates state (a hit sets the reference bit and takes a
//! pin, a miss moves the clock hand and rewrites a slot), so a read/write
//! lock would provide no read-side concurrency. Sharding would split the
//! slot table and defeat the global CLOCK sweep. The critical sections
//! are short and bounded (at most `2 × capacity` probe steps plus two
//! allocations), which suits the constrained targets this cache is
//! written for. Releasing a pin does not take the lock at all; it only
//! touches the entry's atomic counter.
//!
//! # Example
//!
//! ```
//! use refbit_cache::{ClockCache, ClockCacheConfig};
//! use core::num::NonZeroUsize;
//!
//! let cache = ClockCache::init(
//!     ClockCacheConfig { capacity: NonZeroUsize::new(2).unwrap() },
//!     None,
//! ).unwrap();
//!
//! // Miss: the value bytes are copied in and returned pinned.
//! let first = cache.access("config/net", b"mtu=1500").unwrap();
//! assert_eq!(first.payload(), b"mtu=1500");
//!
//! // Hit: the stored bytes win; the miss value is ignored.
//! let again = cache.access("config/net", b"ignored").unwrap();
//! assert_eq!(again.payload(), b"mtu=1500");
//! assert_eq!(again.pin_count(), 2);
//!
//! first.release();
//! again.release();
//! ```

extern crate alloc;

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::num::NonZeroUsize;

use log::{debug, warn};
use parking_lot::Mutex;

use crate::config::ClockCacheConfig;
use crate::entry::{EntryCell, PinnedValue, ReclaimFn};
use crate::error::CacheError;
use crate::index::{HashIndex, RehashOutcome};
use crate::metrics::{CacheMetrics, ClockCacheMetrics};
use crate::slot::SlotTable;

/// The mutable aggregate guarded by the engine lock.
struct CacheInner {
    slots: SlotTable,
    index: HashIndex,
    metrics: ClockCacheMetrics,
    reclaim: Option<ReclaimFn>,
}

impl Drop for CacheInner {
    fn drop(&mut self) {
        // Best-effort shutdown: teardown is documented as happening after
        // worker activity has ceased, so outstanding pins here are worth
        // a warning. The entries are detached, not freed; each holder's
        // last release frees its payload.
        for (slot, entry) in self.slots.occupied() {
            let pins = entry.cell.pins();
            if pins > 0 {
                warn!(
                    "cache dropped with pinned entry: key={} slot={slot} pins={pins}",
                    entry.key
                );
                entry.cell.detach();
            }
        }
    }
}

/// A fixed-capacity, thread-safe key/value cache with CLOCK
/// (second-chance) eviction and pinnable entries.
///
/// The cache holds at most `capacity` resident entries. [`access`]
/// returns values pinned: a pinned entry can be evicted from the index to
/// make room, but its payload stays alive until the last holder releases
/// it. See the [crate docs](crate) for the full lifecycle.
///
/// All methods take `&self`; share the cache across threads with `Arc`.
///
/// [`access`]: ClockCache::access
pub struct ClockCache {
    capacity: NonZeroUsize,
    inner: Mutex<CacheInner>,
}

impl ClockCache {
    /// Creates a cache with `config.capacity` slots and a hash index
    /// sized to the next prime ≥ twice that.
    ///
    /// `reclaim`, if given, runs exactly once per entry with the payload
    /// bytes just before they are freed, whether that happens at
    /// eviction, at the last release of a detached entry, or at cache
    /// teardown.
    ///
    /// Fails atomically: if either table allocation fails, everything
    /// allocated so far is released and [`CacheError::Alloc`] is
    /// returned.
    pub fn init(
        config: ClockCacheConfig,
        reclaim: Option<ReclaimFn>,
    ) -> Result<Self, CacheError> {
        let capacity = config.capacity;
        let slots = SlotTable::with_capacity(capacity.get())?;
        let index = HashIndex::for_capacity(capacity.get())?;
        Ok(Self {
            capacity,
            inner: Mutex::new(CacheInner {
                slots,
                index,
                metrics: ClockCacheMetrics::new(),
                reclaim,
            }),
        })
    }

    /// Returns the pinned value for `key`, installing `value_on_miss`
    /// first if the key is not resident.
    ///
    /// On a hit the entry's reference bit is set and a pin is taken; the
    /// miss value is ignored. On a miss the CLOCK sweep picks a victim
    /// slot, the outgoing entry (if any) is freed or detached, and the
    /// key and value bytes are copied into the cache. Either way the
    /// caller ends up holding exactly one new pin, released by dropping
    /// the returned [`PinnedValue`].
    ///
    /// # Errors
    ///
    /// [`CacheError::EmptyKey`] if `key` is empty.
    /// [`CacheError::Alloc`] if copying the key or payload fails; the
    /// operation is rolled back and the cache stays valid, though a
    /// victim evicted before the failure stays evicted. Treat this as
    /// cache-unavailable and recompute the value.
    pub fn access(&self, key: &str, value_on_miss: &[u8]) -> Result<PinnedValue, CacheError> {
        if key.is_empty() {
            return Err(CacheError::EmptyKey);
        }

        let mut guard = self.inner.lock();
        let inner = &mut *guard;

        if let Some(slot) = inner.index.lookup(key, &inner.slots) {
            if let Some(cell) = inner.slots.cell_at(slot) {
                cell.mark_referenced();
                inner.metrics.record_hit();
                let handle = PinnedValue::pin(Arc::clone(cell));
                debug!("cache hit: key={key} slot={slot} pins={}", handle.pin_count());
                return Ok(handle);
            }
        }

        inner.metrics.record_miss();
        let victim = inner.slots.select_victim();
        if victim.forced {
            warn!(
                "no unpinned victim found, forcing eviction at slot {}",
                victim.slot
            );
            inner.metrics.record_forced_eviction();
        }

        // Erase before vacating: probe comparisons resolve the outgoing
        // key through the slot table, so it must still be there.
        if let Some(old_key) = inner.slots.key_at(victim.slot) {
            inner.index.erase(old_key, &inner.slots);
        }
        if let Some(old) = inner.slots.take(victim.slot) {
            let detached = old.cell.pins() > 0;
            if detached {
                old.cell.detach();
            }
            inner.metrics.record_eviction(detached);
            debug!(
                "evicted key={} from slot {} (detached={detached})",
                old.key, victim.slot
            );
        }

        let mut key_copy = String::new();
        key_copy.try_reserve_exact(key.len())?;
        key_copy.push_str(key);

        let mut payload = Vec::new();
        payload.try_reserve_exact(value_on_miss.len())?;
        payload.extend_from_slice(value_on_miss);

        let cell = Arc::new(EntryCell::new(
            payload.into_boxed_slice(),
            victim.slot,
            inner.reclaim.clone(),
        ));
        let handle = PinnedValue::pin(Arc::clone(&cell));
        inner.slots.install(victim.slot, key_copy, cell);

        match inner.index.insert(key, victim.slot, &inner.slots) {
            RehashOutcome::NotNeeded => {}
            RehashOutcome::Grew => inner.metrics.record_rehash(true),
            RehashOutcome::Failed => {
                warn!(
                    "hash index growth failed, continuing with {} occupied of {} buckets",
                    inner.index.occupied(),
                    inner.index.bucket_count()
                );
                inner.metrics.record_rehash(false);
            }
        }
        inner.metrics.record_insertion(value_on_miss.len() as u64);
        debug!("cache miss: stored key={key} in slot {}", victim.slot);
        #[cfg(debug_assertions)]
        inner.index.debug_validate_invariants(&inner.slots);
        Ok(handle)
    }

    /// The fixed slot capacity.
    #[inline]
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// Number of resident entries.
    pub fn len(&self) -> usize {
        self.inner.lock().slots.len()
    }

    /// Returns `true` if no entry is resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evicts every resident entry and resets the index.
    ///
    /// Pinned entries are detached, exactly as in a capacity eviction;
    /// their holders keep valid payloads.
    pub fn clear(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        for slot in 0..inner.slots.capacity() {
            if let Some(old) = inner.slots.take(slot) {
                let detached = old.cell.pins() > 0;
                if detached {
                    old.cell.detach();
                }
                inner.metrics.record_eviction(detached);
            }
        }
        inner.index.clear();
    }

    /// A point-in-time diagnostic view of every occupied slot plus the
    /// clock hand. Intended for tests and observability, not part of the
    /// correctness contract.
    pub fn snapshot(&self) -> CacheSnapshot {
        let guard = self.inner.lock();
        let slots = guard
            .slots
            .occupied()
            .map(|(slot, entry)| SlotState {
                slot,
                key: entry.key.clone(),
                pins: entry.cell.pins(),
                referenced: entry.cell.referenced(),
            })
            .collect();
        CacheSnapshot {
            clock_hand: guard.slots.hand(),
            slots,
        }
    }

    /// A copy of the current metrics counters.
    pub fn metrics_snapshot(&self) -> ClockCacheMetrics {
        self.inner.lock().metrics.clone()
    }
}

impl CacheMetrics for ClockCache {
    fn metrics(&self) -> BTreeMap<String, f64> {
        self.inner.lock().metrics.to_btreemap()
    }

    fn algorithm_name(&self) -> &'static str {
        "CLOCK+RB"
    }
}

impl fmt::Debug for ClockCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

/// Diagnostic state of one occupied slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotState {
    /// Slot position in the table.
    pub slot: usize,
    /// The key resident in the slot.
    pub key: String,
    /// Outstanding pins on the slot's entry.
    pub pins: usize,
    /// The entry's CLOCK reference bit.
    pub referenced: bool,
}

/// Diagnostic snapshot of the whole cache, from
/// [`ClockCache::snapshot`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSnapshot {
    /// Position of the clock hand at snapshot time.
    pub clock_hand: usize,
    /// Occupied slots in table order.
    pub slots: Vec<SlotState>,
}

impl fmt::Display for CacheSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cache state (hand={}):", self.clock_hand)?;
        for s in &self.slots {
            write!(
                f,
                " [{}: {}, ref={}, bit={}]",
                s.slot,
                s.key,
                s.pins,
                u8::from(s.referenced)
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;

    use super::*;
    use crate::entry::Residency;
    use alloc::format;
    use alloc::vec;
    use core::sync::atomic::{AtomicUsize, Ordering};

    fn make_cache(capacity: usize) -> ClockCache {
        ClockCache::init(
            ClockCacheConfig {
                capacity: NonZeroUsize::new(capacity).unwrap(),
            },
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_miss_then_hit() {
        let cache = make_cache(2);
        let miss = cache.access("a", b"alpha").unwrap();
        assert_eq!(miss.payload(), b"alpha");
        assert_eq!(miss.pin_count(), 1);
        assert!(miss.referenced());

        let hit = cache.access("a", b"ignored").unwrap();
        assert_eq!(hit.payload(), b"alpha");
        assert_eq!(hit.pin_count(), 2);
        assert_eq!(cache.len(), 1);

        let m = cache.metrics_snapshot();
        assert_eq!(m.requests, 2);
        assert_eq!(m.hits, 1);
        miss.release();
        hit.release();
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let cache = make_cache(2);
        assert_eq!(cache.access("", b"x").unwrap_err(), CacheError::EmptyKey);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_eviction_order_without_pins() {
        let cache = make_cache(2);
        cache.access("a", b"1").unwrap().release();
        cache.access("b", b"2").unwrap().release();
        // Both slots referenced; the sweep strips the bits and lands on
        // the earliest slot: "a" goes, "b" stays.
        cache.access("c", b"3").unwrap().release();

        let snapshot = cache.snapshot();
        let keys: Vec<&str> = snapshot.slots.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["c", "b"]);
        assert_eq!(cache.len(), 2);

        // "b" is still a hit and keeps its slot.
        let b = cache.access("b", b"ignored").unwrap();
        assert_eq!(b.payload(), b"2");
        b.release();
    }

    #[test]
    fn test_pinned_entry_detaches_instead_of_freeing() {
        let cache = make_cache(1);
        let pinned = cache.access("a", b"held").unwrap();

        let other = cache.access("b", b"new").unwrap();
        assert_eq!(other.payload(), b"new");
        assert_eq!(cache.len(), 1);

        // The pinned handle survived the forced eviction.
        assert_eq!(pinned.residency(), Residency::Detached);
        assert_eq!(pinned.payload(), b"held");

        let m = cache.metrics_snapshot();
        assert_eq!(m.forced_evictions, 1);
        assert_eq!(m.detached_evictions, 1);

        // "a" is no longer indexed; accessing it again is a miss.
        let fresh = cache.access("a", b"refetched").unwrap();
        assert_eq!(fresh.payload(), b"refetched");
        assert_eq!(pinned.payload(), b"held");

        pinned.release();
        other.release();
        fresh.release();
    }

    #[test]
    fn test_release_makes_entry_evictable_but_not_freed() {
        let cache = make_cache(2);
        let a = cache.access("a", b"1").unwrap();
        a.release();
        // Released but still resident: the next access is a hit.
        let again = cache.access("a", b"ignored").unwrap();
        assert_eq!(again.payload(), b"1");
        again.release();
    }

    #[test]
    fn test_capacity_bound_holds() {
        let cache = make_cache(3);
        for i in 0..32 {
            let key = format!("key{i}");
            cache.access(&key, key.as_bytes()).unwrap().release();
            assert!(cache.len() <= 3);
        }
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_clear_detaches_pinned() {
        let cache = make_cache(4);
        let held = cache.access("a", b"held").unwrap();
        cache.access("b", b"2").unwrap().release();
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(held.residency(), Residency::Detached);
        assert_eq!(held.payload(), b"held");
        held.release();
    }

    #[test]
    fn test_snapshot_display_format() {
        let cache = make_cache(2);
        let a = cache.access("a", b"1").unwrap();
        let snapshot = cache.snapshot();
        let rendered = format!("{snapshot}");
        assert!(rendered.starts_with("cache state (hand="));
        assert!(rendered.contains("[0: a, ref=1, bit=1]"));
        a.release();
    }

    #[test]
    fn test_drop_with_outstanding_pin_detaches() {
        let cache = make_cache(2);
        let held = cache.access("a", b"survivor").unwrap();
        drop(cache);
        assert_eq!(held.residency(), Residency::Detached);
        assert_eq!(held.payload(), b"survivor");
        held.release();
    }

    #[test]
    fn test_reclaim_called_once_per_entry() {
        static FREED: AtomicUsize = AtomicUsize::new(0);
        FREED.store(0, Ordering::Relaxed);
        let reclaim: ReclaimFn = Arc::new(|_bytes: &mut [u8]| {
            FREED.fetch_add(1, Ordering::Relaxed);
        });

        let cache = ClockCache::init(
            ClockCacheConfig {
                capacity: NonZeroUsize::new(2).unwrap(),
            },
            Some(reclaim),
        )
        .unwrap();

        cache.access("a", b"1").unwrap().release();
        cache.access("b", b"2").unwrap().release();
        cache.access("c", b"3").unwrap().release(); // evicts "a"
        assert_eq!(FREED.load(Ordering::Relaxed), 1);

        drop(cache); // frees "b" and "c"
        assert_eq!(FREED.load(Ordering::Relaxed), 3);
    }

    #[test]
    fn test_metrics_trait_exposes_counters() {
        let cache = make_cache(2);
        cache.access("a", b"12345").unwrap().release();
        cache.access("a", b"ignored").unwrap().release();

        let metrics = cache.metrics();
        assert_eq!(metrics.get("requests"), Some(&2.0));
        assert_eq!(metrics.get("cache_hits"), Some(&1.0));
        assert_eq!(metrics.get("bytes_written"), Some(&5.0));
        assert_eq!(cache.algorithm_name(), "CLOCK+RB");
    }

    #[test]
    fn test_debug_format() {
        let cache = make_cache(2);
        let rendered = format!("{:?}", cache);
        assert!(rendered.contains("ClockCache"));
        assert!(rendered.contains("capacity"));
    }
}
