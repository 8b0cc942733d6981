//! Cache statistics.

use std::sync::atomic::{AtomicU64, Ordering};

/// Statistics for lookaside cache operations.
#[derive(Debug, Default)]
pub struct CacheStats {
    /// Lookups answered from the cache.
    pub hits: AtomicU64,
    /// Lookups that had to go to the remote store.
    pub misses: AtomicU64,
    /// Remote store calls issued.
    pub remote_calls: AtomicU64,
    /// Remote store calls that failed.
    pub remote_failures: AtomicU64,
    /// Full cache drops.
    pub invalidations: AtomicU64,
    /// Row keys appended by populations.
    pub keys_populated: AtomicU64,
}

impl CacheStats {
    /// Create new stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
        self.remote_calls.store(0, Ordering::Relaxed);
        self.remote_failures.store(0, Ordering::Relaxed);
        self.invalidations.store(0, Ordering::Relaxed);
        self.keys_populated.store(0, Ordering::Relaxed);
    }

    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }
}

impl Clone for CacheStats {
    fn clone(&self) -> Self {
        Self {
            hits: AtomicU64::new(self.hits.load(Ordering::Relaxed)),
            misses: AtomicU64::new(self.misses.load(Ordering::Relaxed)),
            remote_calls: AtomicU64::new(self.remote_calls.load(Ordering::Relaxed)),
            remote_failures: AtomicU64::new(self.remote_failures.load(Ordering::Relaxed)),
            invalidations: AtomicU64::new(self.invalidations.load(Ordering::Relaxed)),
            keys_populated: AtomicU64::new(self.keys_populated.load(Ordering::Relaxed)),
        }
    }
}
