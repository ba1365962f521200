#![doc = include_str!("../README.md")]
//!
//! ---
//!
//! # Code Reference
//!
//! ## Entry Lifecycle
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                        Entry Lifecycle                              │
//! │                                                                     │
//! │   access(miss)                                                      │
//! │       │                                                             │
//! │       ▼                                                             │
//! │  ┌──────────┐  evicted, no pins   ┌───────┐                         │
//! │  │ Resident │────────────────────▶│ Freed │                         │
//! │  │ (slot i) │                     └───────┘                         │
//! │  └────┬─────┘                         ▲                             │
//! │       │ evicted, pins > 0             │ last release                │
//! │       ▼                               │                             │
//! │  ┌──────────┐─────────────────────────┘                             │
//! │  │ Detached │   payload stays valid for every holder                │
//! │  └──────────┘                                                       │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A hit pins the resident entry and sets its reference bit. A miss runs
//! the CLOCK sweep: starting at the persistent clock hand, empty slots
//! and unpinned entries with a clear reference bit are taken immediately;
//! everything else loses its reference bit and the hand moves on. If
//! `2 × capacity` probes find nothing (every entry pinned or freshly
//! referenced, no empty slot), the sweep's starting slot is forced out in
//! a degraded, logged path; the outgoing entry is detached, never freed
//! under pins.
//!
//! ## Quick Reference
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | [`ClockCache::init`] | Allocate slot table + hash index, fallibly |
//! | [`ClockCache::access`] | Get-or-insert, returns a [`PinnedValue`] |
//! | [`PinnedValue::release`] / drop | Release the pin |
//! | [`ClockCache::clear`] | Evict everything (pinned entries detach) |
//! | [`ClockCache::snapshot`] | Diagnostic per-slot state dump |
//!
//! ## Concurrency
//!
//! Share the cache with `Arc`; every method takes `&self`:
//!
//! ```rust
//! use refbit_cache::{ClockCache, ClockCacheConfig};
//! use core::num::NonZeroUsize;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let cache = Arc::new(ClockCache::init(
//!     ClockCacheConfig { capacity: NonZeroUsize::new(4).unwrap() },
//!     None,
//! ).unwrap());
//!
//! let handles: Vec<_> = (0..4).map(|t| {
//!     let cache = Arc::clone(&cache);
//!     thread::spawn(move || {
//!         for i in 0..100 {
//!             let key = format!("key{}", i % 8);
//!             let value = cache.access(&key, key.as_bytes()).unwrap();
//!             value.release();
//!         }
//!         let _ = t;
//!     })
//! }).collect();
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! ```
//!
//! ## Modules
//!
//! - [`cache`]: the engine facade and diagnostic snapshot types
//! - [`entry`]: the refcounted value cell, residency state, pin handle
//! - [`config`]: configuration structure
//! - [`error`]: error taxonomy
//! - [`metrics`]: counters and the reporting trait

#![no_std]

/// Cache engine facade.
///
/// Coordinates the slot table, hash index, and entry lifecycle under a
/// single mutex and exposes `access`/`clear`/`snapshot`.
pub mod cache;

/// Cache configuration structure.
pub mod config;

/// Refcounted entry cell, residency state, and the pinned-value handle.
pub mod entry;

/// Error types for fallible cache operations.
pub mod error;

/// Metrics counters and the `CacheMetrics` reporting trait.
pub mod metrics;

/// Open-addressed hash index over slot keys.
///
/// Internal infrastructure: maps keys to slot positions with FNV-1a
/// hashing, linear probing, and tombstone deletes.
pub(crate) mod index;

/// Fixed slot table and CLOCK victim selection.
///
/// Internal infrastructure: owns key copies and entry cells, and carries
/// the persistent clock hand.
pub(crate) mod slot;

pub use cache::{CacheSnapshot, ClockCache, SlotState};
pub use config::ClockCacheConfig;
pub use entry::{PinnedValue, ReclaimFn, Residency};
pub use error::CacheError;
pub use metrics::{CacheMetrics, ClockCacheMetrics};
