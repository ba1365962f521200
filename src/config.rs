//! Cache Configuration
//!
//! This module provides the configuration structure for the CLOCK cache.
//!
//! # Design Philosophy
//!
//! The configuration struct has all public fields for simple instantiation:
//!
//! - **Simple**: Just create the struct with all fields set
//! - **Type safety**: Capacity is a `NonZeroUsize`, so a zero-slot cache is
//!   unrepresentable
//! - **No boilerplate**: No constructors or builder methods needed
//!
//! # Sizing Guidelines
//!
//! `capacity` is the number of slots, fixed for the lifetime of the cache.
//! The hash index is sized automatically to the next prime at or above
//! twice the capacity, so probe sequences stay short even with every slot
//! occupied.
//!
//! ```text
//! Total memory ≈ capacity × (key bytes + payload bytes + entry overhead)
//!              + next_prime(2 × capacity) × bucket overhead
//! ```
//!
//! On constrained targets, pick a capacity that covers the hot working set
//! and rely on pinning to keep in-flight values alive past eviction rather
//! than over-provisioning slots.
//!
//! # Examples
//!
//! ```
//! use refbit_cache::config::ClockCacheConfig;
//! use refbit_cache::ClockCache;
//! use core::num::NonZeroUsize;
//!
//! let config = ClockCacheConfig {
//!     capacity: NonZeroUsize::new(64).unwrap(),
//! };
//! let cache = ClockCache::init(config, None).unwrap();
//! assert_eq!(cache.capacity().get(), 64);
//! ```

use core::fmt;
use core::num::NonZeroUsize;

/// Configuration for a [`ClockCache`](crate::ClockCache).
///
/// The cache holds at most `capacity` resident entries at any moment.
/// Capacity cannot change after creation; entries evicted under pin
/// pressure survive detached until their holders release them, but they
/// no longer occupy a slot.
///
/// # Examples
///
/// ```
/// use refbit_cache::config::ClockCacheConfig;
/// use core::num::NonZeroUsize;
///
/// // A small cache for an embedded working set
/// let config = ClockCacheConfig {
///     capacity: NonZeroUsize::new(4).unwrap(),
/// };
/// assert_eq!(config.capacity.get(), 4);
/// ```
#[derive(Clone, Copy)]
pub struct ClockCacheConfig {
    /// Number of slots in the slot table. Fixed at creation.
    pub capacity: NonZeroUsize,
}

impl fmt::Debug for ClockCacheConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClockCacheConfig")
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;

    use super::*;
    use alloc::format;

    #[test]
    fn test_config_creation() {
        let config = ClockCacheConfig {
            capacity: NonZeroUsize::new(128).unwrap(),
        };
        assert_eq!(config.capacity.get(), 128);
    }

    #[test]
    fn test_config_copy_and_debug() {
        let config = ClockCacheConfig {
            capacity: NonZeroUsize::new(8).unwrap(),
        };
        let copied = config;
        assert_eq!(copied.capacity, config.capacity);

        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("ClockCacheConfig"));
        assert!(debug_str.contains("8"));
    }
}
