//! Shared key-value cache facade.
//!
//! Every piece of cross-request state the gateway keeps (route-cache
//! entries, round-robin counters, idempotency markers, DDoS counters and
//! blocks) goes through the [`Cache`] trait, so multiple gateway
//! instances can share a Redis-backed store while tests and single-node
//! deployments run against the in-process [`MemoryCache`].
//!
//! The contract mirrors the operations the dataplane actually relies on:
//! plain `get`/`set`/`delete`, atomic `add` (set-if-absent) and
//! `incr`/`decr`, glob-pattern `keys` enumeration, and bulk
//! `delete_many`. TTLs apply at write time; `incr` on an existing key
//! preserves the key's remaining TTL.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

mod memory;
mod redis_backend;

pub use memory::MemoryCache;
pub use redis_backend::RedisCache;

/// Errors surfaced by a cache backend. The dataplane maps these onto 503
/// except where a subsystem explicitly fails open (the DDoS middleware).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("cache backend error: {0}")]
    Backend(String),
    #[error("value for key '{key}' is not a counter")]
    NotACounter { key: String },
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        CacheError::Backend(err.to_string())
    }
}

/// Shared handle to a cache backend.
pub type DynCache = Arc<dyn Cache>;

#[async_trait]
pub trait Cache: Send + Sync {
    /// Fetch a value, `None` when absent or expired.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Unconditionally store a value, replacing whatever was there.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError>;

    /// Store a value only if the key is absent. Returns whether the write
    /// won; the atomicity of this operation is what the idempotency guard
    /// and the warm-up sentinel lean on.
    async fn add(&self, key: &str, value: &str, ttl: Option<Duration>)
        -> Result<bool, CacheError>;

    /// Atomically add `delta` to a counter, creating it at zero first.
    /// Returns the post-increment value.
    async fn incr(&self, key: &str, delta: i64) -> Result<i64, CacheError>;

    /// Atomically subtract `delta` from a counter.
    async fn decr(&self, key: &str, delta: i64) -> Result<i64, CacheError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Remove a batch of keys.
    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Enumerate keys matching a glob pattern (`*` wildcards only).
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError>;
}

/// Build a cache handle from an optional URL: `redis://…` connects to the
/// shared store, `None` falls back to the in-process cache.
pub async fn from_url(url: Option<&str>) -> Result<DynCache, CacheError> {
    match url {
        Some(url) => Ok(Arc::new(RedisCache::connect(url).await?)),
        None => Ok(Arc::new(MemoryCache::new())),
    }
}
