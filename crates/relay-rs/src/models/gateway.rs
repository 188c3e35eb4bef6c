use serde::{Deserialize, Serialize};

/// Scheme a node speaks. Targets and upstreams carry their own scheme so a
/// cluster can mix plain and TLS backends.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Http => "http",
            Scheme::Https => "https",
        }
    }
}

impl Default for Scheme {
    fn default() -> Self {
        Scheme::Http
    }
}

/// Selection policy applied over an upstream's enabled targets.
///
/// - **RoundRobin**: rotates through the targets plus the upstream itself
///   as a trailing fallback slot, driven by a shared counter.
/// - **WeightRobin**: draws a random point under the cumulative target
///   weights, so traffic is split proportionally.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LoadBalancing {
    RoundRobin,
    WeightRobin,
}

impl Default for LoadBalancing {
    fn default() -> Self {
        LoadBalancing::RoundRobin
    }
}

fn default_weight() -> u32 {
    100
}

fn default_timeout_sec() -> u64 {
    10
}

fn default_enabled() -> bool {
    true
}

/// Logical backend cluster fronting zero or more targets.
///
/// When every target is disabled (or none exist) the upstream's own
/// `scheme + host` serves as the sole node, so a cluster never becomes
/// unroutable by configuration alone.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Upstream {
    pub id: i64,
    pub alias: String,
    #[serde(default)]
    pub scheme: Scheme,
    pub host: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default)]
    pub load_balance: LoadBalancing,
    #[serde(default)]
    pub retries: u32,
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
}

impl Upstream {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            scheme: self.scheme,
            host: self.host.clone(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.alias.is_empty() {
            return Err(format!("upstream {} must have an alias", self.id));
        }
        if self.host.is_empty() {
            return Err(format!("upstream '{}' must have a host", self.alias));
        }
        if self.timeout_sec == 0 {
            return Err(format!(
                "upstream '{}' timeout must be at least 1 second",
                self.alias
            ));
        }
        Ok(())
    }
}

/// Physical backend node belonging to an upstream.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Target {
    pub id: i64,
    pub upstream_id: i64,
    #[serde(default)]
    pub scheme: Scheme,
    pub host: String,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl Target {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            scheme: self.scheme,
            host: self.host.clone(),
        }
    }
}

/// The node a load-balancing pass settled on: either a target or the
/// upstream itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub scheme: Scheme,
    pub host: String,
}

impl Endpoint {
    /// Base URL of the node, e.g. `http://10.0.0.4:8080`.
    pub fn full_path(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.host)
    }
}

/// Principal permitted on a route. BASIC_AUTH matches by `identifier`,
/// KEY_AUTH by `apikey`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Consumer {
    pub id: i64,
    pub user_id: i64,
    #[serde(default)]
    pub identifier: String,
    #[serde(default)]
    pub apikey: String,
}

/// Route: maps an inbound path prefix onto an upstream and a rewritten
/// path, gated by an auth plugin.
///
/// A request matches when its path starts with `request_path`; whatever
/// follows the prefix (including the query string) is appended after
/// `wrapped_path` when forwarding. Overlapping routes resolve to the
/// longest `request_path`, ties to the lowest `id`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Api {
    pub id: i64,
    pub name: String,
    pub request_path: String,
    pub wrapped_path: String,
    pub upstream_id: i64,
    #[serde(default)]
    pub plugin: u8,
    #[serde(default)]
    pub consumers: Vec<Consumer>,
}

impl Api {
    /// Portion of the inbound path (plus query) left over once the matched
    /// prefix is removed. An unmatched prefix leaves the path untouched.
    pub fn trailing_path(&self, full_path: &str) -> String {
        full_path
            .strip_prefix(&self.request_path)
            .map(str::to_owned)
            .unwrap_or_else(|| full_path.to_owned())
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.request_path.starts_with('/') {
            return Err(format!(
                "route '{}': request_path must start with '/'",
                self.name
            ));
        }
        if !self.wrapped_path.starts_with('/') {
            return Err(format!(
                "route '{}': wrapped_path must start with '/'",
                self.name
            ));
        }
        Ok(())
    }
}

/// Route-cache value: a route joined with its upstream and the targets
/// that were enabled when the entry was built. Stored as one JSON blob so
/// a cache hit needs no further store lookups.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ResolvedRoute {
    pub api: Api,
    pub upstream: Upstream,
    pub targets: Vec<Target>,
}
