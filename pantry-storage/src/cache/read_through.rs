//! Read-through cache in front of shopping-list aggregation.
//!
//! Lookups and writes are bounded by [`CacheConfig::operation_timeout`]. Any
//! backend trouble (timeouts, connection errors, undecodable entries) is
//! logged and treated as a miss, so the cache can slow a request down by at
//! most two timeouts but never fail it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use pantry_core::{AggregatedLine, CacheError, Caller, PantryResult, UserId};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::clock::{CacheClock, SystemClock};
use super::freshness::CacheRead;
use super::key::shopping_list_key;
use super::traits::{CacheBackend, CacheStats};
use crate::aggregate::Aggregator;

/// Configuration for the shopping-list cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// TTL for cached entries.
    pub entry_ttl: Duration,
    /// Upper bound on any single backend call.
    pub operation_timeout: Duration,
    /// Capacity of the in-memory backend.
    pub max_entries: usize,
    /// Use Redis when set, the in-memory backend otherwise.
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            entry_ttl: Duration::from_secs(300),
            operation_timeout: Duration::from_millis(250),
            max_entries: 10_000,
            redis_url: None,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from `PANTRY_CACHE_*` and `PANTRY_REDIS_URL`, falling back to
    /// defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            entry_ttl: std::env::var("PANTRY_CACHE_TTL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.entry_ttl),
            operation_timeout: std::env::var("PANTRY_CACHE_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.operation_timeout),
            max_entries: std::env::var("PANTRY_CACHE_MAX_ENTRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_entries),
            redis_url: std::env::var("PANTRY_REDIS_URL")
                .ok()
                .filter(|s| !s.trim().is_empty()),
        }
    }

    /// Set the entry TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.entry_ttl = ttl;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = max;
        self
    }

    pub fn with_redis_url(mut self, url: impl Into<String>) -> Self {
        self.redis_url = Some(url.into());
        self
    }
}

/// Serialized cache entry.
#[derive(Debug, Serialize, Deserialize)]
struct CachedShoppingList {
    cached_at: DateTime<Utc>,
    lines: Vec<AggregatedLine>,
}

#[derive(Debug, Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    backend_errors: AtomicU64,
}

/// Per-user shopping-list cache.
///
/// Entries are keyed by [`shopping_list_key`] and never invalidated when a
/// cart changes: a hit can lag the cart by up to one TTL. Concurrent misses
/// for the same user each aggregate and write; the last write wins and every
/// writer stores an equivalent value.
pub struct ShoppingListCache {
    aggregator: Aggregator,
    backend: Arc<dyn CacheBackend>,
    clock: Arc<dyn CacheClock>,
    config: CacheConfig,
    counters: Counters,
}

impl ShoppingListCache {
    pub fn new(aggregator: Aggregator, backend: Arc<dyn CacheBackend>, config: CacheConfig) -> Self {
        Self::with_clock(aggregator, backend, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        aggregator: Aggregator,
        backend: Arc<dyn CacheBackend>,
        config: CacheConfig,
        clock: Arc<dyn CacheClock>,
    ) -> Self {
        Self {
            aggregator,
            backend,
            clock,
            config,
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Cached aggregate for the caller, computing and storing it on a miss.
    ///
    /// Empty aggregates are cached like any other.
    pub async fn get_or_compute(
        &self,
        caller: &Caller,
    ) -> PantryResult<CacheRead<Vec<AggregatedLine>>> {
        let user = caller.require_user()?;
        let key = shopping_list_key(user);

        if let Some(hit) = self.lookup(user, &key).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            debug!(user_id = %user, cache_key = %key, "Shopping list cache hit");
            return Ok(CacheRead::from_cache(hit.lines, hit.cached_at));
        }
        self.counters.misses.fetch_add(1, Ordering::Relaxed);

        let lines = self.aggregator.aggregate(caller).await?;
        let computed_at = self.clock.now();
        self.store(user, &key, &lines, computed_at).await;

        Ok(CacheRead::from_storage(lines, computed_at))
    }

    async fn lookup(&self, user: UserId, key: &str) -> Option<CachedShoppingList> {
        let bytes = match self.bounded(self.backend.get(key)).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
                warn!(
                    user_id = %user,
                    backend = self.backend.name(),
                    error = %e,
                    "Shopping list cache lookup failed, recomputing"
                );
                return None;
            }
        };

        match serde_json::from_slice::<CachedShoppingList>(&bytes) {
            Ok(entry) => Some(entry),
            Err(e) => {
                self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
                let err = CacheError::Corrupt {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                warn!(user_id = %user, error = %err, "Discarding cache entry");
                None
            }
        }
    }

    async fn store(
        &self,
        user: UserId,
        key: &str,
        lines: &[AggregatedLine],
        computed_at: DateTime<Utc>,
    ) {
        let entry = CachedShoppingList {
            cached_at: computed_at,
            lines: lines.to_vec(),
        };
        let bytes = match serde_json::to_vec(&entry) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(user_id = %user, error = %e, "Could not encode shopping list for cache");
                return;
            }
        };

        let write = self
            .bounded(self.backend.set(key, bytes, self.config.entry_ttl))
            .await;
        if let Err(e) = write {
            self.counters.backend_errors.fetch_add(1, Ordering::Relaxed);
            warn!(
                user_id = %user,
                backend = self.backend.name(),
                error = %e,
                "Shopping list cache write failed"
            );
        }
    }

    async fn bounded<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        F: std::future::Future<Output = Result<T, CacheError>>,
    {
        tokio::time::timeout(self.config.operation_timeout, op)
            .await
            .map_err(|_| CacheError::Unavailable {
                reason: format!("timed out after {:?}", self.config.operation_timeout),
            })?
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            backend_errors: self.counters.backend_errors.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for ShoppingListCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShoppingListCache")
            .field("backend", &self.backend.name())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// TESTS
// ============================================================================
