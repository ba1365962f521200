//! Cache Error Types
//!
//! Errors surfaced by fallible cache operations. Allocation failures are
//! reported through [`CacheError::Alloc`], carrying the underlying
//! [`TryReserveError`]; every allocation made by the failing operation is
//! released before the error returns, and the cache remains in its prior
//! valid state.
//!
//! Index growth failure and degraded eviction are deliberately *not*
//! errors: both are recovered internally and reported through the metrics
//! counters and the log facade instead (see
//! [`ClockCacheMetrics`](crate::metrics::ClockCacheMetrics)).

extern crate alloc;

use alloc::collections::TryReserveError;
use core::fmt;

/// Errors returned by cache construction and access.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// An allocation (slot table, hash index, key copy, or payload copy)
    /// failed. The operation was rolled back; treat the cache as
    /// unavailable for this value and recompute or refetch it.
    Alloc(TryReserveError),

    /// `access` was called with an empty key. Keys must be non-empty
    /// strings.
    EmptyKey,
}

impl fmt::Display for CacheError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheError::Alloc(err) => write!(f, "cache allocation failed: {err:?}"),
            CacheError::EmptyKey => write!(f, "cache keys must be non-empty"),
        }
    }
}

impl core::error::Error for CacheError {}

impl From<TryReserveError> for CacheError {
    fn from(err: TryReserveError) -> Self {
        CacheError::Alloc(err)
    }
}

#[cfg(test)]
mod tests {
    extern crate alloc;

    use super::*;
    use alloc::format;
    use alloc::string::String;
    use alloc::vec::Vec;

    #[test]
    fn test_display_empty_key() {
        let msg = format!("{}", CacheError::EmptyKey);
        assert!(msg.contains("non-empty"));
    }

    #[test]
    fn test_alloc_error_from_try_reserve() {
        let mut v: Vec<u8> = Vec::new();
        // Asking for an absurd reservation is the portable way to obtain
        // a real TryReserveError.
        let err = v.try_reserve_exact(usize::MAX).unwrap_err();
        let cache_err: CacheError = err.into();
        assert!(matches!(cache_err, CacheError::Alloc(_)));
        assert!(format!("{}", cache_err).contains("allocation"));
    }

    #[test]
    fn test_error_equality() {
        assert_eq!(CacheError::EmptyKey, CacheError::EmptyKey);
        let mut s = String::new();
        let err = s.try_reserve_exact(usize::MAX).unwrap_err();
        assert_ne!(CacheError::Alloc(err), CacheError::EmptyKey);
    }
}
