//! Cache Statistics Module
//!
//! Tracks cache hits, misses, and how often the store switched backends.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache performance and fallback metrics.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Number of successful cache retrievals
    pub hits: u64,
    /// Number of failed cache retrievals (key absent or expired)
    pub misses: u64,
    /// Remote calls that failed and were served by the local backend
    pub remote_errors: u64,
    /// Times the store switched from remote to local fallback
    pub demotions: u64,
    /// Times the store re-adopted the remote backend
    pub promotions: u64,
    /// Entries physically held by the local backend
    pub local_entries: usize,
}

impl CacheStats {
    // == Constructor ==
    /// Creates a new CacheStats with all counters at zero.
    pub fn new() -> Self {
        Self::default()
    }

    // == Hit Rate ==
    /// Calculates the cache hit rate.
    ///
    /// Returns hits / (hits + misses), or 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    pub fn record_remote_error(&mut self) {
        self.remote_errors += 1;
    }

    pub fn record_demotion(&mut self) {
        self.demotions += 1;
    }

    pub fn record_promotion(&mut self) {
        self.promotions += 1;
    }

    pub fn set_local_entries(&mut self, count: usize) {
        self.local_entries = count;
    }
}
