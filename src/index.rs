//! Open-addressed hash index over slot keys.
//!
//! Maps key strings to slot positions with FNV-1a hashing and linear
//! probing. Buckets carry the cached 64-bit hash and the slot index; the
//! key bytes themselves are owned by the slot table, and equality during
//! probing is resolved through it. Deletes leave tombstones, which are
//! reclaimed wholesale by the next successful rehash.
//!
//! This module is internal infrastructure; consumers interact with it
//! only through [`ClockCache`](crate::ClockCache).

extern crate alloc;

use alloc::vec::Vec;

use crate::error::CacheError;
use crate::slot::SlotTable;

/// FNV-1a, 64-bit variant.
pub(crate) fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= u64::from(b);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

/// Smallest prime ≥ `n` (by trial division; table sizes are small enough
/// that this is never on a hot path).
pub(crate) fn next_prime(n: usize) -> usize {
    let mut candidate = n.max(2);
    loop {
        let mut is_prime = true;
        let mut i = 2usize;
        while i * i <= candidate {
            if candidate % i == 0 {
                is_prime = false;
                break;
            }
            i += 1;
        }
        if is_prime {
            return candidate;
        }
        candidate += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Bucket {
    Empty,
    Tombstone,
    Occupied { hash: u64, slot: usize },
}

/// Result of the load-factor check performed ahead of an insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RehashOutcome {
    /// Load was below the threshold; no growth attempted.
    NotNeeded,
    /// The table grew to the next prime ≥ twice its previous size.
    Grew,
    /// Growth allocation failed; the old table stays in service at the
    /// higher load factor.
    Failed,
}

pub(crate) struct HashIndex {
    buckets: Vec<Bucket>,
    used: usize,
    tombstones: usize,
}

impl HashIndex {
    /// Builds an index for a cache of `capacity` slots, sized to the
    /// next prime ≥ 2 × capacity.
    pub(crate) fn for_capacity(capacity: usize) -> Result<Self, CacheError> {
        let len = next_prime(capacity.saturating_mul(2));
        let mut buckets = Vec::new();
        buckets.try_reserve_exact(len)?;
        buckets.resize_with(len, || Bucket::Empty);
        Ok(Self {
            buckets,
            used: 0,
            tombstones: 0,
        })
    }

    #[inline]
    pub(crate) fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub(crate) fn occupied(&self) -> usize {
        self.used
    }

    #[cfg(test)]
    fn tombstone_count(&self) -> usize {
        self.tombstones
    }

    /// Looks up `key`, returning the slot index it maps to.
    ///
    /// Probing stops at the first EMPTY bucket or after a full cycle;
    /// the load-factor invariant keeps cycles from ever being probed in
    /// full under normal operation.
    pub(crate) fn lookup(&self, key: &str, slots: &SlotTable) -> Option<usize> {
        let hash = fnv1a(key.as_bytes());
        let len = self.buckets.len();
        let mut pos = (hash % len as u64) as usize;
        for _ in 0..len {
            match self.buckets[pos] {
                Bucket::Empty => return None,
                Bucket::Occupied { hash: h, slot }
                    if h == hash && slots.key_at(slot) == Some(key) =>
                {
                    return Some(slot);
                }
                _ => {}
            }
            pos = (pos + 1) % len;
        }
        None
    }

    /// Maps `key` to `slot`. The key must already be stored in the slot
    /// table at `slot` so probe comparisons can resolve it.
    ///
    /// An existing mapping for the key is overwritten in place. New
    /// mappings prefer the first tombstone seen along the probe sequence
    /// over a later EMPTY bucket, reclaiming dead space. The returned
    /// outcome reports whether the pre-insert load check grew the table.
    pub(crate) fn insert(&mut self, key: &str, slot: usize, slots: &SlotTable) -> RehashOutcome {
        let outcome = if (self.used + self.tombstones) * 10 >= self.buckets.len() * 7 {
            match self.grow() {
                Ok(()) => RehashOutcome::Grew,
                Err(_) => RehashOutcome::Failed,
            }
        } else {
            RehashOutcome::NotNeeded
        };

        let hash = fnv1a(key.as_bytes());
        let len = self.buckets.len();
        let mut pos = (hash % len as u64) as usize;
        let mut first_tombstone = None;
        for _ in 0..len {
            match self.buckets[pos] {
                Bucket::Empty => {
                    self.claim(first_tombstone.unwrap_or(pos), hash, slot);
                    return outcome;
                }
                Bucket::Tombstone => {
                    if first_tombstone.is_none() {
                        first_tombstone = Some(pos);
                    }
                }
                Bucket::Occupied { hash: h, slot: s } => {
                    if h == hash && slots.key_at(s) == Some(key) {
                        self.buckets[pos] = Bucket::Occupied { hash, slot };
                        return outcome;
                    }
                }
            }
            pos = (pos + 1) % len;
        }

        // Full cycle without an EMPTY bucket: possible only after failed
        // rehashes have left the table saturated with tombstones, and
        // occupancy ≤ slot capacity < bucket count guarantees one exists.
        if let Some(tombstone) = first_tombstone {
            self.claim(tombstone, hash, slot);
        }
        outcome
    }

    fn claim(&mut self, pos: usize, hash: u64, slot: usize) {
        if self.buckets[pos] == Bucket::Tombstone {
            self.tombstones -= 1;
        }
        self.buckets[pos] = Bucket::Occupied { hash, slot };
        self.used += 1;
    }

    /// Tombstones the mapping for `key`; no-op if the key is absent.
    pub(crate) fn erase(&mut self, key: &str, slots: &SlotTable) {
        let hash = fnv1a(key.as_bytes());
        let len = self.buckets.len();
        let mut pos = (hash % len as u64) as usize;
        for _ in 0..len {
            match self.buckets[pos] {
                Bucket::Empty => return,
                Bucket::Occupied { hash: h, slot }
                    if h == hash && slots.key_at(slot) == Some(key) =>
                {
                    self.buckets[pos] = Bucket::Tombstone;
                    self.used -= 1;
                    self.tombstones += 1;
                    return;
                }
                _ => {}
            }
            pos = (pos + 1) % len;
        }
    }

    /// Resets every bucket to EMPTY without changing the table size.
    pub(crate) fn clear(&mut self) {
        for bucket in &mut self.buckets {
            *bucket = Bucket::Empty;
        }
        self.used = 0;
        self.tombstones = 0;
    }

    /// Grows to the next prime ≥ 2 × the current size, re-inserting
    /// every OCCUPIED bucket from its cached hash and dropping
    /// tombstones. On allocation failure the old table is left intact.
    fn grow(&mut self) -> Result<(), CacheError> {
        let new_len = next_prime(self.buckets.len().saturating_mul(2));
        let mut new_buckets = Vec::new();
        new_buckets.try_reserve_exact(new_len)?;
        new_buckets.resize_with(new_len, || Bucket::Empty);

        for bucket in &self.buckets {
            if let Bucket::Occupied { hash, slot } = *bucket {
                let mut pos = (hash % new_len as u64) as usize;
                while new_buckets[pos] != Bucket::Empty {
                    pos = (pos + 1) % new_len;
                }
                new_buckets[pos] = Bucket::Occupied { hash, slot };
            }
        }

        self.buckets = new_buckets;
        self.tombstones = 0;
        Ok(())
    }

    #[cfg(any(test, debug_assertions))]
    pub(crate) fn debug_validate_invariants(&self, slots: &SlotTable) {
        let occupied = self
            .buckets
            .iter()
            .filter(|b| matches!(b, Bucket::Occupied { .. }))
            .count();
        let tombstones = self
            .buckets
            .iter()
            .filter(|b| matches!(b, Bucket::Tombstone))
            .count();
        assert_eq!(self.used, occupied);
        assert_eq!(self.tombstones, tombstones);

        for bucket in &self.buckets {
            if let Bucket::Occupied { hash, slot } = *bucket {
                let key = slots.key_at(slot).expect("index maps to a keyless slot");
                assert_eq!(fnv1a(key.as_bytes()), hash);
            }
        }
    }
}

impl core::fmt::Debug for HashIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HashIndex")
            .field("buckets", &self.buckets.len())
            .field("used", &self.used)
            .field("tombstones", &self.tombstones)
            .finish()
    }
}
