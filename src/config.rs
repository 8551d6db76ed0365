//! Cache configuration

use std::time::Duration;

/// Tuning knobs shared by all six directory indexes.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// An entry expires this long after its last write.
    pub eviction_ttl: Duration,
    /// Maximum number of entries each index may hold.
    pub lru_max: u64,
}

impl CacheConfig {
    pub fn new(eviction_ttl: Duration, lru_max: u64) -> Self {
        Self {
            eviction_ttl,
            lru_max,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            eviction_ttl: Duration::from_secs(300), // 5 minutes
            lru_max: 10_000,
        }
    }
}
