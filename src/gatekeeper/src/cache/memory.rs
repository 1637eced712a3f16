//! In-process cache store with per-entry TTL

use super::CacheStore;
use crate::config::CacheConfig;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Cached value with its insertion time and TTL
#[derive(Clone)]
struct CachedEntry {
    value: Value,
    cached_at: Instant,
    ttl: Option<Duration>,
}

impl CachedEntry {
    fn new(value: Value, ttl: Option<Duration>) -> Self {
        Self {
            value,
            cached_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.ttl.is_some_and(|ttl| self.cached_at.elapsed() > ttl)
    }
}

/// Concurrent in-memory [`CacheStore`]
///
/// - DashMap storage, safe under concurrent refills of the same key
/// - lazy TTL expiry on read
/// - bounded size, evicting the oldest entries first when full
pub struct InMemoryCacheStore {
    entries: Arc<DashMap<String, CachedEntry>>,
    max_entries: usize,
    stats: Arc<DashMap<&'static str, usize>>,
}

impl InMemoryCacheStore {
    pub fn new(config: &CacheConfig) -> Self {
        Self::with_capacity(config.max_entries)
    }

    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries: max_entries.max(1),
            stats: Arc::new(DashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.get_stat("hits"),
            misses: self.get_stat("misses"),
            expirations: self.get_stat("expirations"),
            evictions: self.get_stat("evictions"),
            entries: self.entries.len(),
            max_entries: self.max_entries,
        }
    }

    /// Make room for one insert: drop expired entries, then the oldest
    fn evict(&self) {
        self.entries.retain(|_, entry| !entry.is_expired());
        if self.entries.len() < self.max_entries {
            return;
        }

        let overflow = self.entries.len() + 1 - self.max_entries;
        let mut by_age: Vec<(String, Instant)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().cached_at))
            .collect();
        by_age.sort_by_key(|(_, cached_at)| *cached_at);

        for (key, _) in by_age.into_iter().take(overflow) {
            self.entries.remove(&key);
            self.increment_stat("evictions");
        }
    }

    fn increment_stat(&self, key: &'static str) {
        self.stats
            .entry(key)
            .and_modify(|count| *count += 1)
            .or_insert(1);
    }

    fn get_stat(&self, key: &'static str) -> usize {
        self.stats.get(key).map(|v| *v).unwrap_or(0)
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_expired() {
                drop(entry);
                self.entries.remove(key);
                self.increment_stat("expirations");
                self.increment_stat("misses");
                return Ok(None);
            }

            self.increment_stat("hits");
            return Ok(Some(entry.value.clone()));
        }

        self.increment_stat("misses");
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()> {
        if !self.entries.contains_key(key) && self.entries.len() >= self.max_entries {
            self.evict();
        }
        self.entries.insert(key.to_string(), CachedEntry::new(value, ttl));
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.key().starts_with(prefix) && !e.value().is_expired())
            .map(|e| e.key().clone())
            .collect())
    }

    async fn del_many(&self, keys: &[String]) -> Result<usize> {
        Ok(keys
            .iter()
            .filter(|key| self.entries.remove(key.as_str()).is_some())
            .count())
    }

    async fn reset(&self) -> Result<()> {
        self.entries.clear();
        self.stats.clear();
        Ok(())
    }
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub expirations: usize,
    pub evictions: usize,
    pub entries: usize,
    pub max_entries: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}
