//! Process-local cache backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pantry_core::CacheError;

use super::clock::{CacheClock, SystemClock};
use super::traits::CacheBackend;

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: DateTime<Utc>,
}

/// Bounded in-memory backend.
///
/// When full, expired entries are dropped first, then the entry closest to
/// expiry.
pub struct InMemoryCacheBackend {
    entries: Mutex<HashMap<String, Entry>>,
    clock: Arc<dyn CacheClock>,
    max_entries: usize,
}

impl InMemoryCacheBackend {
    pub fn new(max_entries: usize) -> Self {
        Self::with_clock(max_entries, Arc::new(SystemClock))
    }

    pub fn with_clock(max_entries: usize, clock: Arc<dyn CacheClock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
            max_entries: max_entries.max(1),
        }
    }

    /// Live entries, expired ones excluded.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        match self.entries.lock() {
            Ok(entries) => entries.values().filter(|e| e.expires_at > now).count(),
            Err(_) => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn make_room(entries: &mut HashMap<String, Entry>, now: DateTime<Utc>, max: usize) {
        if entries.len() < max {
            return;
        }
        entries.retain(|_, e| e.expires_at > now);
        while entries.len() >= max {
            let victim = entries
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(k, _)| k.clone());
            match victim {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

impl Default for InMemoryCacheBackend {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().map_err(|_| CacheError::LockPoisoned)?;
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > now => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let now = self.clock.now();
        let ttl = chrono::Duration::from_std(ttl).map_err(|e| CacheError::Unavailable {
            reason: format!("ttl out of range: {}", e),
        })?;
        let mut entries = self.entries.lock().map_err(|_| CacheError::LockPoisoned)?;
        if !entries.contains_key(key) {
            Self::make_room(&mut entries, now, self.max_entries);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.lock().map_err(|_| CacheError::LockPoisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
