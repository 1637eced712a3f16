//! Cache-aside layer
//!
//! [`CacheStore`] is the raw key/value contract (TTL plus prefix bulk
//! invalidation). [`CachingService`] wraps any store with typed access, a
//! default TTL, a per-call timeout, and the log-and-degrade behaviour the
//! resolvers rely on: a store that fails or stalls reads as "absent" and
//! swallows writes.

mod memory;

pub use memory::{CacheStats, InMemoryCacheStore};

use crate::config::CacheConfig;
use crate::error::{AuthzError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Prefix shared by every role-related key
pub const ROLES_PREFIX: &str = "ROLES";

/// Well-known key of the global path policy
pub const ROLES_PATHS_KEY: &str = "ROLES_PATHS";

/// Cache key of a subject's role list
pub fn roles_key(subject_id: &str) -> String {
    format!("{}_{}", ROLES_PREFIX, subject_id)
}

/// Key/value store with TTL and prefix-based bulk invalidation
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Fetch a live value
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Store a value; `None` TTL means no expiry
    async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) -> Result<()>;

    /// Remove one key
    async fn del(&self, key: &str) -> Result<()>;

    /// Live keys starting with `prefix`
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove several keys, returning how many existed
    async fn del_many(&self, keys: &[String]) -> Result<usize>;

    /// Drop everything
    async fn reset(&self) -> Result<()>;
}

/// Typed, bounded access to a [`CacheStore`]
#[derive(Clone)]
pub struct CachingService {
    store: Arc<dyn CacheStore>,
    default_ttl: Duration,
    operation_timeout: Duration,
}

impl CachingService {
    pub fn new(store: Arc<dyn CacheStore>, config: &CacheConfig) -> Self {
        Self {
            store,
            default_ttl: config.ttl,
            operation_timeout: config.operation_timeout,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Run one store call under the operation timeout
    async fn bounded<T, F>(&self, op: &'static str, key: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.operation_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AuthzError::CacheError(format!(
                "{} '{}' timed out after {:?}",
                op, key, self.operation_timeout
            ))),
        }
    }

    /// Typed read; store failures and undecodable values read as absent
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.bounded("get", key, self.store.get(key)).await {
            Ok(raw) => raw?,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache read failed");
                return None;
            }
        };

        match serde_json::from_value(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!(key = %key, error = %e, "Cached value has unexpected shape");
                None
            }
        }
    }

    /// Typed write with the default TTL
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) {
        self.set_with_ttl(key, value, Some(self.default_ttl)).await
    }

    /// Typed write; failures are logged and swallowed
    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        let raw = match serde_json::to_value(value) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(key = %key, error = %e, "Cache value could not be encoded");
                return;
            }
        };

        if let Err(e) = self.bounded("set", key, self.store.set(key, raw, ttl)).await {
            debug!(key = %key, error = %e, "Cache write failed");
        }
    }

    pub async fn del(&self, key: &str) -> Result<()> {
        self.bounded("del", key, self.store.del(key)).await
    }

    pub async fn reset(&self) -> Result<()> {
        self.bounded("reset", "*", self.store.reset()).await
    }

    /// Remove every key starting with `prefix`
    pub async fn invalidate_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self
            .bounded("keys", prefix, self.store.keys_with_prefix(prefix))
            .await?;
        if keys.is_empty() {
            return Ok(0);
        }

        let removed = self
            .bounded("del_many", prefix, self.store.del_many(&keys))
            .await?;
        debug!(prefix = %prefix, removed, "Invalidated cache prefix");
        Ok(removed)
    }

    /// Cache-aside read.
    ///
    /// On a miss the loader runs; a `Some` result is written back when
    /// `persist` is set.
    pub async fn get_or_else<T, F, Fut>(&self, key: &str, loader: F, persist: bool) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Ok(Some(hit));
        }

        let loaded = loader().await?;
        if persist {
            if let Some(value) = &loaded {
                self.set(key, value).await;
            }
        }
        Ok(loaded)
    }

    /// Cache-aside read where absence is an error
    pub async fn get_or_fail<T, F, Fut>(&self, key: &str, loader: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        self.get_or_else(key, loader, true)
            .await?
            .ok_or_else(|| AuthzError::Internal(format!("{} not found", key)))
    }
}
