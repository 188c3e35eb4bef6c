//! Upstream node selection.
//!
//! Both policies roll over the *enabled* targets of an upstream and fall
//! back to the upstream's own host when no target can serve:
//!
//! - round-robin rotates through `[t₁ … tₙ, upstream]` driven by a shared
//!   cache counter, so concurrent gateway instances interleave fairly;
//! - weight-robin draws a uniform point below the cumulative target
//!   weights.

use log::warn;
use rand::Rng;

use crate::cache::{Cache, DynCache};
use crate::models::error::GatewayError;
use crate::models::gateway::{Endpoint, LoadBalancing, Target, Upstream};

#[derive(Clone)]
pub struct LoadBalancer {
    cache: DynCache,
}

impl LoadBalancer {
    pub fn new(cache: DynCache) -> Self {
        Self { cache }
    }

    /// Pick the node for the next request to `upstream`.
    pub async fn select(
        &self,
        upstream: &Upstream,
        targets: &[Target],
    ) -> Result<Endpoint, GatewayError> {
        let enabled: Vec<&Target> = targets.iter().filter(|t| t.enabled).collect();
        let count = self.request_count(upstream.id).await?;
        if enabled.is_empty() {
            return Ok(upstream.endpoint());
        }
        match upstream.load_balance {
            LoadBalancing::RoundRobin => Ok(Self::round_robin(count, upstream, &enabled)),
            LoadBalancing::WeightRobin => Ok(Self::weight_robin(upstream, &enabled)),
        }
    }

    /// Rotation slot `(count - 1) mod (n + 1)` over targets plus the
    /// upstream itself: the first request of a fresh counter lands on the
    /// first target, every `n + 1`th lands on the upstream.
    fn round_robin(count: i64, upstream: &Upstream, enabled: &[&Target]) -> Endpoint {
        let slots = enabled.len() + 1;
        let index = (count - 1).rem_euclid(slots as i64) as usize;
        if index == enabled.len() {
            upstream.endpoint()
        } else {
            enabled[index].endpoint()
        }
    }

    /// Draw `r ∈ [0, Σweight)` and take the first target whose cumulative
    /// weight exceeds it. All-zero weights fall back to the upstream.
    fn weight_robin(upstream: &Upstream, enabled: &[&Target]) -> Endpoint {
        let total: u64 = enabled.iter().map(|t| t.weight as u64).sum();
        if total == 0 {
            return upstream.endpoint();
        }
        let drawn = rand::thread_rng().gen_range(0..total);
        let mut cumulative = 0u64;
        for target in enabled {
            cumulative += target.weight as u64;
            if drawn < cumulative {
                return target.endpoint();
            }
        }
        upstream.endpoint()
    }

    /// Post-increment of the upstream's shared request counter.
    async fn request_count(&self, upstream_id: i64) -> Result<i64, GatewayError> {
        let key = format!("upstream:{upstream_id}-called");
        self.cache.add(&key, "0", None).await?;
        Ok(self.cache.incr(&key, 1).await?)
    }

    /// Bump the upstream's in-flight connection gauge. Accounting only;
    /// failures degrade to 0 with a warning.
    pub async fn incr_connections(&self, upstream_id: i64) -> i64 {
        let key = connection_key(upstream_id);
        if let Err(e) = self.cache.add(&key, "0", None).await {
            warn!("connection gauge unavailable for upstream {upstream_id}: {e}");
            return 0;
        }
        self.cache.incr(&key, 1).await.unwrap_or(0)
    }

    /// Decrement the in-flight connection gauge.
    pub async fn decr_connections(&self, upstream_id: i64) -> i64 {
        self.cache
            .decr(&connection_key(upstream_id), 1)
            .await
            .unwrap_or(0)
    }
}

fn connection_key(upstream_id: i64) -> String {
    format!("upstream:{upstream_id}-connection")
}
