//! Fingerprinted cache of resolved routes.
//!
//! Entries are keyed `0/api:path=<request_path>:upstream=<upstream_id>:end`
//! so both lookup and invalidation can work off the key text alone: lookup
//! scans for the longest `path=` prefix of the inbound path, invalidation
//! purges by `upstream=` pattern. Entries are purely an accelerator:
//! purging them changes latency, never correctness.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::cache::{Cache, DynCache};
use crate::models::error::GatewayError;
use crate::models::gateway::ResolvedRoute;
use crate::store::ConfigStore;

pub const MINUTE: u64 = 60;
pub const HOUR: u64 = 60 * MINUTE;
pub const DAY: u64 = 24 * HOUR;

/// Routes change rarely; entries mostly die by invalidation, the TTL is a
/// backstop.
const ROUTE_TTL: Duration = Duration::from_secs(30 * DAY);
/// Sentinel preventing concurrent warm-ups across instances.
const WARM_UP_TTL: Duration = Duration::from_secs(2 * MINUTE);
const WARM_UP_KEY: &str = "warm_up";
const CACHE_HIT_KEY: &str = "cache_hit";

static KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0/api:path=(.+?):upstream=(.*):end$").unwrap());

#[derive(Clone)]
pub struct RouteCache {
    cache: DynCache,
    store: Arc<ConfigStore>,
}

impl RouteCache {
    pub fn new(cache: DynCache, store: Arc<ConfigStore>) -> Self {
        Self { cache, store }
    }

    /// Cache key for one route.
    pub fn entry_key(request_path: &str, upstream_id: i64) -> String {
        format!("0/api:path={request_path}:upstream={upstream_id}:end")
    }

    /// Resolve the route serving `path`: cached entry first, store on a
    /// miss (populating the cache), `RouteNotFound` when nothing matches.
    pub async fn lookup(&self, path: &str) -> Result<ResolvedRoute, GatewayError> {
        if let Some(route) = self.cached(path).await? {
            return Ok(route);
        }

        let api = self
            .store
            .find_by_prefix(path)
            .ok_or_else(|| GatewayError::RouteNotFound {
                path: path.to_string(),
            })?;
        let route = self
            .store
            .resolve(api)
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        self.insert(&route).await?;
        debug!(
            "route cache miss for {path}, cached {} -> upstream {}",
            route.api.request_path, route.upstream.id
        );
        Ok(route)
    }

    /// Scan cached keys for prefixes of `path`. The longest `path=`
    /// segment wins; ties resolve to the lowest upstream id.
    async fn cached(&self, path: &str) -> Result<Option<ResolvedRoute>, GatewayError> {
        let keys = self.cache.keys("0/api:*:end").await?;
        let mut best: Option<(usize, i64, String)> = None;
        for key in keys {
            let Some(captures) = KEY_RE.captures(&key) else {
                continue;
            };
            let cached_path = &captures[1];
            if !path.starts_with(cached_path) {
                continue;
            }
            let upstream_id: i64 = captures[2].parse().unwrap_or(i64::MAX);
            let candidate = (cached_path.len(), upstream_id);
            let beats = match &best {
                Some((len, uid, _)) => {
                    candidate.0 > *len || (candidate.0 == *len && candidate.1 < *uid)
                }
                None => true,
            };
            if beats {
                best = Some((candidate.0, candidate.1, key));
            }
        }

        let Some((_, _, key)) = best else {
            return Ok(None);
        };
        let Some(raw) = self.cache.get(&key).await? else {
            return Ok(None);
        };
        match serde_json::from_str::<ResolvedRoute>(&raw) {
            Ok(route) => {
                self.count_hit().await;
                Ok(Some(route))
            }
            Err(_) => {
                // stale blob from an older schema; drop it and fall back
                // to the store
                self.cache.delete(&key).await?;
                Ok(None)
            }
        }
    }

    async fn insert(&self, route: &ResolvedRoute) -> Result<(), GatewayError> {
        let key = Self::entry_key(&route.api.request_path, route.upstream.id);
        let blob = serde_json::to_string(route)
            .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        self.cache.set(&key, &blob, Some(ROUTE_TTL)).await?;
        Ok(())
    }

    /// Purge every entry pointing at `upstream_id`. Called for any write
    /// to a route, upstream or target of that upstream.
    pub async fn invalidate(&self, upstream_id: i64) -> Result<usize, GatewayError> {
        let pattern = format!("0/api:path=*:upstream={upstream_id}:end");
        let keys = self.cache.keys(&pattern).await?;
        let purged = keys.len();
        self.cache.delete_many(&keys).await?;
        Ok(purged)
    }

    /// Populate one entry per route. The sentinel add is atomic, so of
    /// several instances booting at once only one does the work; the rest
    /// return immediately with 0.
    pub async fn warm_up(&self) -> Result<usize, GatewayError> {
        if !self.cache.add(WARM_UP_KEY, "1", Some(WARM_UP_TTL)).await? {
            info!("route cache warm-up already performed recently, skipping");
            return Ok(0);
        }
        let mut count = 0;
        for api in self.store.apis() {
            let route = self
                .store
                .resolve(api)
                .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
            self.insert(&route).await?;
            count += 1;
        }
        info!("route cache warmed with {count} entries");
        Ok(count)
    }

    /// Number of lookups served from the cache since boot.
    pub async fn hits(&self) -> u64 {
        match self.cache.get(CACHE_HIT_KEY).await {
            Ok(Some(v)) => v.parse().unwrap_or(0),
            _ => 0,
        }
    }

    async fn count_hit(&self) {
        // accounting only; a failed bump must not fail the lookup
        if self.cache.add(CACHE_HIT_KEY, "0", None).await.is_ok() {
            let _ = self.cache.incr(CACHE_HIT_KEY, 1).await;
        }
    }
}
