use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use regex::Regex;

use super::{Cache, CacheError};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// Process-local cache backend.
///
/// Behaves like the Redis backend from the dataplane's point of view:
/// `add` is a genuine set-if-absent, counters are atomic under the single
/// interior lock, and expired entries read as absent. State is not shared
/// across processes, so this backend suits tests and single-instance
/// deployments only.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Entry>> {
        // A poisoned lock means a panic mid-operation; the cache holds no
        // invariants beyond single entries, so keep serving.
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn counter_value(entry: Option<&Entry>, key: &str, now: Instant) -> Result<i64, CacheError> {
        match entry {
            Some(e) if !e.is_expired(now) => {
                e.value.parse::<i64>().map_err(|_| CacheError::NotACounter {
                    key: key.to_string(),
                })
            }
            _ => Ok(0),
        }
    }
}

/// Compile a glob pattern (`*` wildcards) into an anchored regex.
fn glob_regex(pattern: &str) -> Result<Regex, CacheError> {
    let escaped = regex::escape(pattern).replace("\\*", ".*");
    Regex::new(&format!("^{escaped}$"))
        .map_err(|e| CacheError::Backend(format!("bad key pattern '{pattern}': {e}")))
}

#[async_trait]
impl Cache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let now = Instant::now();
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                entries.remove(key);
                Ok(None)
            }
            Some(entry) => Ok(Some(entry.value.clone())),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<(), CacheError> {
        let entry = Entry {
            value: value.to_string(),
            expires_at: ttl.map(|t| Instant::now() + t),
        };
        self.lock().insert(key.to_string(), entry);
        Ok(())
    }

    async fn add(
        &self,
        key: &str,
        value: &str,
        ttl: Option<Duration>,
    ) -> Result<bool, CacheError> {
        let now = Instant::now();
        let mut entries = self.lock();
        if let Some(existing) = entries.get(key) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|t| now + t),
            },
        );
        Ok(true)
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        let now = Instant::now();
        let mut entries = self.lock();
        let current = Self::counter_value(entries.get(key), key, now)?;
        let next = current + delta;
        // A fresh counter gets no TTL, matching Redis INCR; an existing
        // counter keeps its expiry.
        let expires_at = entries
            .get(key)
            .filter(|e| !e.is_expired(now))
            .and_then(|e| e.expires_at);
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn decr(&self, key: &str, delta: i64) -> Result<i64, CacheError> {
        self.incr(key, -delta).await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn delete_many(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.lock();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let re = glob_regex(pattern)?;
        let now = Instant::now();
        let mut entries = self.lock();
        entries.retain(|_, entry| !entry.is_expired(now));
        Ok(entries
            .keys()
            .filter(|k| re.is_match(k))
            .cloned()
            .collect())
    }
}
