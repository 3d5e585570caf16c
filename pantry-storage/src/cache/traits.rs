//! Cache backend trait and usage counters.

use std::time::Duration;

use async_trait::async_trait;
use pantry_core::CacheError;

/// Byte-oriented key/value store with per-entry expiry.
///
/// Backends own expiry: a `get` after the TTL has elapsed returns `None`.
/// Encoding is left to the caller so the trait stays object safe.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    /// Store `value` under `key`, replacing any previous entry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses, including degraded lookups.
    pub misses: u64,
    /// Lookups or writes that failed or timed out.
    pub backend_errors: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
