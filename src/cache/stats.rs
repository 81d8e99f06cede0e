//! Cache Statistics Module
//!
//! Tracks how often the cache actually saved a backend round trip.

use serde::Serialize;

// == Cache Stats ==
/// Tracks cache effectiveness and absorbed failures.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CacheStats {
    /// Reads answered from the cache
    pub hits: u64,
    /// Reads that found nothing usable
    pub misses: u64,
    /// Entries purged because their TTL had passed
    pub expired: u64,
    /// Reads whose blob failed to decrypt or decode
    pub decrypt_failures: u64,
    /// Successful writes
    pub writes: u64,
    /// Writes skipped because crypto or storage is unsupported
    pub skipped_writes: u64,
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
    /// Returns hits / (hits + misses), or 0.0 if no reads have been made.
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

    /// Counts `count` expired entries purged by a read or sweep.
    pub fn record_expired(&mut self, count: u64) {
        self.expired += count;
    }

    /// Counts an undecryptable entry; also a miss.
    pub fn record_decrypt_failure(&mut self) {
        self.decrypt_failures += 1;
        self.misses += 1;
    }

    pub fn record_write(&mut self) {
        self.writes += 1;
    }

    pub fn record_skipped_write(&mut self) {
        self.skipped_writes += 1;
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_new() {
        let stats = CacheStats::new();
        assert_eq!(stats.hits, 0);
        assert_eq!(stats.misses, 0);
        assert_eq!(stats.expired, 0);
        assert_eq!(stats.writes, 0);
    }

    #[test]
    fn test_hit_rate_no_requests() {
        assert_eq!(CacheStats::new().hit_rate(), 0.0);
    }

    #[test]
    fn test_hit_rate_mixed() {
        let mut stats = CacheStats::new();
        stats.record_hit();
        stats.record_miss();
        assert_eq!(stats.hit_rate(), 0.5);
    }

    #[test]
    fn test_decrypt_failure_counts_as_miss() {
        let mut stats = CacheStats::new();
        stats.record_decrypt_failure();
        assert_eq!(stats.decrypt_failures, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.0);
    }

    #[test]
    fn test_record_expired_accumulates() {
        let mut stats = CacheStats::new();
        stats.record_expired(2);
        stats.record_expired(3);
        assert_eq!(stats.expired, 5);
    }
}
