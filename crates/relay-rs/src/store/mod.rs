//! Read-only config store: the gateway's view of routes, upstreams,
//! targets and consumers.
//!
//! The dataplane never writes here; an operator surface maintains the
//! snapshot out of band and the gateway loads it at startup. References
//! between entities are plain ids resolved into flat maps at load time,
//! so nothing downstream ever chases a back-pointer.

use ahash::HashMap as AHashMap;

use crate::models::gateway::{Api, Consumer, ResolvedRoute, Target, Upstream};

/// On-disk shape of the config snapshot. Routes reference consumers by id;
/// [`ConfigStore::from_snapshot`] inlines them.
#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct StoreSnapshot {
    pub version: u8,
    #[serde(default)]
    pub upstreams: Vec<Upstream>,
    #[serde(default)]
    pub targets: Vec<Target>,
    #[serde(default)]
    pub apis: Vec<ApiSpec>,
    #[serde(default)]
    pub consumers: Vec<Consumer>,
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct ApiSpec {
    pub id: i64,
    pub name: String,
    pub request_path: String,
    pub wrapped_path: String,
    pub upstream_id: i64,
    #[serde(default)]
    pub plugin: u8,
    #[serde(default)]
    pub consumer_ids: Vec<i64>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("route '{route}' references unknown upstream {upstream_id}")]
    UnknownUpstream { route: String, upstream_id: i64 },
    #[error("target {target_id} references unknown upstream {upstream_id}")]
    OrphanTarget { target_id: i64, upstream_id: i64 },
    #[error("route '{route}' references unknown consumer {consumer_id}")]
    UnknownConsumer { route: String, consumer_id: i64 },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Resolved, validated snapshot with id-keyed lookups.
#[derive(Debug)]
pub struct ConfigStore {
    upstreams: AHashMap<i64, Upstream>,
    targets_by_upstream: AHashMap<i64, Vec<Target>>,
    apis: Vec<Api>,
}

impl ConfigStore {
    /// Resolve a raw snapshot: inline consumers into their routes, group
    /// targets under their upstream, and reject dangling references.
    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self, StoreError> {
        let mut upstreams = AHashMap::default();
        for upstream in snapshot.upstreams {
            upstream.validate().map_err(StoreError::Invalid)?;
            upstreams.insert(upstream.id, upstream);
        }

        let mut targets_by_upstream: AHashMap<i64, Vec<Target>> = AHashMap::default();
        for target in snapshot.targets {
            if !upstreams.contains_key(&target.upstream_id) {
                return Err(StoreError::OrphanTarget {
                    target_id: target.id,
                    upstream_id: target.upstream_id,
                });
            }
            targets_by_upstream
                .entry(target.upstream_id)
                .or_default()
                .push(target);
        }

        let consumers: AHashMap<i64, Consumer> = snapshot
            .consumers
            .into_iter()
            .map(|c| (c.id, c))
            .collect();

        let mut apis = Vec::with_capacity(snapshot.apis.len());
        for spec in snapshot.apis {
            if !upstreams.contains_key(&spec.upstream_id) {
                return Err(StoreError::UnknownUpstream {
                    route: spec.name,
                    upstream_id: spec.upstream_id,
                });
            }
            let mut route_consumers = Vec::with_capacity(spec.consumer_ids.len());
            for consumer_id in &spec.consumer_ids {
                let consumer =
                    consumers
                        .get(consumer_id)
                        .ok_or_else(|| StoreError::UnknownConsumer {
                            route: spec.name.clone(),
                            consumer_id: *consumer_id,
                        })?;
                route_consumers.push(consumer.clone());
            }
            let api = Api {
                id: spec.id,
                name: spec.name,
                request_path: spec.request_path,
                wrapped_path: spec.wrapped_path,
                upstream_id: spec.upstream_id,
                plugin: spec.plugin,
                consumers: route_consumers,
            };
            api.validate().map_err(StoreError::Invalid)?;
            apis.push(api);
        }
        apis.sort_by_key(|api| api.id);

        Ok(Self {
            upstreams,
            targets_by_upstream,
            apis,
        })
    }

    /// All routes, ordered by id.
    pub fn apis(&self) -> &[Api] {
        &self.apis
    }

    pub fn upstream(&self, id: i64) -> Option<&Upstream> {
        self.upstreams.get(&id)
    }

    /// Enabled targets of an upstream.
    pub fn enabled_targets(&self, upstream_id: i64) -> Vec<Target> {
        self.targets_by_upstream
            .get(&upstream_id)
            .map(|targets| targets.iter().filter(|t| t.enabled).cloned().collect())
            .unwrap_or_default()
    }

    /// Route whose `request_path` is the longest prefix of `path`; ties
    /// resolve to the lowest route id.
    pub fn find_by_prefix(&self, path: &str) -> Option<&Api> {
        self.apis
            .iter()
            .filter(|api| path.starts_with(&api.request_path))
            // apis are id-ordered, so max_by_key keeps the lowest id on ties
            .rev()
            .max_by_key(|api| api.request_path.len())
    }

    /// Join a route with its upstream and enabled targets.
    pub fn resolve(&self, api: &Api) -> Result<ResolvedRoute, StoreError> {
        let upstream = self
            .upstream(api.upstream_id)
            .ok_or_else(|| StoreError::UnknownUpstream {
                route: api.name.clone(),
                upstream_id: api.upstream_id,
            })?;
        Ok(ResolvedRoute {
            api: api.clone(),
            upstream: upstream.clone(),
            targets: self.enabled_targets(api.upstream_id),
        })
    }
}
