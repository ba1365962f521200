//! Refcounted Cache Entry
//!
//! This module provides the value cell shared between the slot table and
//! every outstanding pin, the [`Residency`] state that replaces the
//! classic "slot index or -1" back-reference, and the [`PinnedValue`]
//! handle returned by [`ClockCache::access`](crate::ClockCache::access).
//!
//! # Design
//!
//! The payload is a uniquely owned `Box<[u8]>` inside an `Arc` cell. The
//! slot table holds one `Arc` per resident entry and every pin holds
//! another, so the payload is freed exactly once, at the last drop:
//! never while a holder retains a pin, and never leaked once all holders
//! are gone. Eviction under pin pressure merely flips the cell to
//! [`Residency::Detached`] and drops the slot's `Arc`; the holders'
//! clones keep the bytes alive.
//!
//! The pin count and reference bit are plain atomics. Decisions based on
//! them (victim selection, detach-versus-free) are only ever made while
//! the engine lock is held; handles read them lock-free for diagnostics
//! and decrement the pin count on drop. A release racing a sweep can at
//! worst defer one eviction by a pass; it can never free pinned memory,
//! because lifetime is governed by the `Arc`, not the counter.
//!
//! # Releasing
//!
//! Dropping a `PinnedValue` *is* the release. The handle is not `Clone`
//! and [`PinnedValue::release`] consumes it, so releasing a pin twice is
//! unrepresentable rather than a runtime contract violation.

extern crate alloc;

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Hook invoked exactly once per entry, with the payload bytes, just
/// before the payload is dropped. Intended for wipe-on-free and external
/// resource bookkeeping; `None` at construction means a plain drop.
pub type ReclaimFn = Arc<dyn Fn(&mut [u8]) + Send + Sync>;

/// Internal encoding for "no longer resident in any slot".
const DETACHED: usize = usize::MAX;

/// Where an entry currently lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Residency {
    /// The entry occupies the given slot and is reachable through the
    /// hash index.
    Resident(usize),
    /// The entry was evicted while pinned; it stays alive for its
    /// holders but no slot or index entry refers to it anymore.
    Detached,
}

/// The shared cell holding one cached value.
///
/// Mutable state (pin count, reference bit, residency) is atomic so that
/// handles can observe it without the engine lock; all *decisions* on
/// that state happen under the lock.
pub(crate) struct EntryCell {
    data: Box<[u8]>,
    pins: AtomicUsize,
    referenced: AtomicBool,
    residency: AtomicUsize,
    reclaim: Option<ReclaimFn>,
}

impl EntryCell {
    /// Creates a resident cell with no pins and the reference bit set.
    pub(crate) fn new(data: Box<[u8]>, slot: usize, reclaim: Option<ReclaimFn>) -> Self {
        debug_assert!(slot != DETACHED);
        Self {
            data,
            pins: AtomicUsize::new(0),
            referenced: AtomicBool::new(true),
            residency: AtomicUsize::new(slot),
            reclaim,
        }
    }

    #[inline]
    pub(crate) fn payload(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub(crate) fn pins(&self) -> usize {
        self.pins.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn referenced(&self) -> bool {
        self.referenced.load(Ordering::Relaxed)
    }

    #[inline]
    pub(crate) fn mark_referenced(&self) {
        self.referenced.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn clear_referenced(&self) {
        self.referenced.store(false, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn residency(&self) -> Residency {
        match self.residency.load(Ordering::Relaxed) {
            DETACHED => Residency::Detached,
            slot => Residency::Resident(slot),
        }
    }

    /// Marks the cell evicted-but-alive. Called under the engine lock
    /// when a pinned entry loses its slot.
    #[inline]
    pub(crate) fn detach(&self) {
        self.residency.store(DETACHED, Ordering::Relaxed);
    }
}

impl Drop for EntryCell {
    fn drop(&mut self) {
        if let Some(reclaim) = self.reclaim.take() {
            (*reclaim)(&mut self.data);
        }
    }
}

impl fmt::Debug for EntryCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryCell")
            .field("len", &self.data.len())
            .field("pins", &self.pins())
            .field("referenced", &self.referenced())
            .field("residency", &self.residency())
            .finish()
    }
}

/// A pinned cached value.
///
/// Returned by [`ClockCache::access`](crate::ClockCache::access); the pin
/// keeps the payload alive even if the entry is evicted from the cache in
/// the meantime. Dropping the handle releases the pin. Exactly one
/// release happens per handle by construction: the type is not `Clone`
/// and [`release`](PinnedValue::release) consumes it.
///
/// # Examples
///
/// ```
/// use refbit_cache::{ClockCache, ClockCacheConfig, Residency};
/// use core::num::NonZeroUsize;
///
/// let cache = ClockCache::init(
///     ClockCacheConfig { capacity: NonZeroUsize::new(2).unwrap() },
///     None,
/// ).unwrap();
///
/// let value = cache.access("sensor/0", b"22.5").unwrap();
/// assert_eq!(value.payload(), b"22.5");
/// assert_eq!(value.pin_count(), 1);
/// assert!(value.referenced());
/// assert!(matches!(value.residency(), Residency::Resident(_)));
/// value.release();
/// ```
pub struct PinnedValue {
    cell: Arc<EntryCell>,
}

impl PinnedValue {
    /// Wraps a cell, taking one pin on it.
    pub(crate) fn pin(cell: Arc<EntryCell>) -> Self {
        cell.pins.fetch_add(1, Ordering::Relaxed);
        Self { cell }
    }

    /// Read access to the cached payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        self.cell.payload()
    }

    /// Number of pins currently outstanding on this entry, including
    /// this one. Diagnostic; may be stale the moment it is read.
    #[inline]
    pub fn pin_count(&self) -> usize {
        self.cell.pins()
    }

    /// The CLOCK reference bit. Set on every access, cleared by the
    /// eviction sweep as it grants second chances.
    #[inline]
    pub fn referenced(&self) -> bool {
        self.cell.referenced()
    }

    /// Whether the entry still occupies a slot or has been evicted out
    /// from under this pin.
    #[inline]
    pub fn residency(&self) -> Residency {
        self.cell.residency()
    }

    /// Releases the pin. Equivalent to dropping the handle; provided for
    /// call sites where the release deserves to be visible.
    #[inline]
    pub fn release(self) {}
}

impl Drop for PinnedValue {
    fn drop(&mut self) {
        self.cell.pins.fetch_sub(1, Ordering::Relaxed);
    }
}

impl fmt::Debug for PinnedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinnedValue")
            .field("len", &self.payload().len())
            .field("pin_count", &self.pin_count())
            .field("referenced", &self.referenced())
            .field("residency", &self.residency())
            .finish()
    }
}
