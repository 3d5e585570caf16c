//! Shopping-list cache.
//!
//! A per-user read-through cache over [`Aggregator`](crate::Aggregator)
//! output with a fixed TTL and no invalidation. Reads return
//! [`CacheRead<T>`] so callers can tell a hit from a fresh computation.
//!
//! Two backends are provided: Redis for deployments with several API
//! processes, and a bounded in-process map for everything else.

pub mod clock;
pub mod freshness;
pub mod key;
pub mod memory_backend;
pub mod read_through;
pub mod redis_backend;
pub mod traits;

use std::sync::Arc;

use tracing::{info, warn};

pub use clock::{CacheClock, ManualClock, SystemClock};
pub use freshness::CacheRead;
pub use key::shopping_list_key;
pub use memory_backend::InMemoryCacheBackend;
pub use read_through::{CacheConfig, ShoppingListCache};
pub use redis_backend::RedisCacheBackend;
pub use traits::{CacheBackend, CacheStats};

/// Build the backend named by `config`.
///
/// An unreachable Redis is not fatal: the process starts with the in-memory
/// backend and logs a warning.
pub async fn init_backend(config: &CacheConfig) -> Arc<dyn CacheBackend> {
    if let Some(url) = &config.redis_url {
        match RedisCacheBackend::connect(url, config.operation_timeout.max(CONNECT_FLOOR)).await {
            Ok(backend) => return Arc::new(backend),
            Err(e) => warn!(error = %e, "Redis cache unavailable, using in-memory cache"),
        }
    }
    info!(max_entries = config.max_entries, "Initialized in-memory shopping list cache");
    Arc::new(InMemoryCacheBackend::new(config.max_entries))
}

const CONNECT_FLOOR: std::time::Duration = std::time::Duration::from_secs(2);
