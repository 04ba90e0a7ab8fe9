//! In-process caching engine
//!
//! Bounded key/value store with optional per-entry TTL, backed by `DashMap`
//! so handlers can share it without locking.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde_json::Value;

use crate::core::{CacheConfig, CacheEngine};

#[derive(Debug)]
struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

#[derive(Debug, Clone)]
pub struct MemoryCache {
    name: Arc<str>,
    max_entries: usize,
    entries: Arc<DashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn from_config(config: &CacheConfig) -> Self {
        let max_entries = match config.engine {
            CacheEngine::Memory { max_entries } => max_entries,
        };
        Self {
            name: Arc::from(config.name.as_str()),
            max_entries,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        let now = Instant::now();
        let expired = match self.entries.get(key) {
            Some(entry) if entry.is_expired(now) => true,
            Some(entry) => return Some(entry.value.clone()),
            None => return None,
        };
        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        None
    }

    /// Insert or replace `key`. Returns `false` when the cache is full and no
    /// expired entry could be evicted to make room.
    pub fn set(&self, key: impl Into<String>, value: Value, ttl: Option<Duration>) -> bool {
        let key = key.into();
        if !self.entries.contains_key(&key) && self.entries.len() >= self.max_entries {
            let now = Instant::now();
            self.entries.retain(|_, entry| !entry.is_expired(now));
            if self.entries.len() >= self.max_entries {
                return false;
            }
        }

        self.entries.insert(
            key,
            CacheEntry {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        true
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.entries.remove(key).map(|(_, entry)| entry.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache(max_entries: usize) -> MemoryCache {
        MemoryCache::from_config(&CacheConfig {
            name: "test".into(),
            engine: CacheEngine::Memory { max_entries },
        })
    }

    #[test]
    fn test_set_get_remove() {
        let cache = cache(4);
        assert_eq!(cache.name(), "test");
        assert!(cache.set("a", json!(1), None));
        assert_eq!(cache.get("a"), Some(json!(1)));
        assert_eq!(cache.remove("a"), Some(json!(1)));
        assert!(cache.get("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_expired_entries_are_dropped() {
        let cache = cache(4);
        cache.set("short", json!("x"), Some(Duration::ZERO));
        assert!(cache.get("short").is_none());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_capacity_is_bounded() {
        let cache = cache(2);
        assert!(cache.set("a", json!(1), None));
        assert!(cache.set("b", json!(2), None));
        assert!(!cache.set("c", json!(3), None));
        // replacing an existing key is always allowed
        assert!(cache.set("a", json!(10), None));
        assert_eq!(cache.get("a"), Some(json!(10)));
    }

    #[test]
    fn test_full_cache_evicts_expired_first() {
        let cache = cache(1);
        cache.set("stale", json!(1), Some(Duration::ZERO));
        assert!(cache.set("fresh", json!(2), None));
        assert_eq!(cache.get("fresh"), Some(json!(2)));
    }
}
