//! # Relay-rs API Gateway
//!
//! An async HTTP API gateway built with Rust and Actix Web. Relay-rs
//! fronts a fleet of upstream clusters: it matches inbound paths to
//! configured routes, enforces per-route authentication, load-balances
//! across backend targets, de-duplicates keyed writes, and throttles
//! abusive origins, with all cross-instance state held in a shared cache.
//!
//! ## Request Pipeline
//!
//! ```text
//! ┌────────┐   ┌─────────────────────────────┐   ┌───────────┐
//! │ Client │──▶│ relay-rs                    │──▶│ Upstream  │
//! └────────┘   │  ┌───────────────────────┐  │   │ Targets   │
//!              │  │ DDoS blocker          │  │   └───────────┘
//!              │  ├───────────────────────┤  │
//!              │  │ Route cache / lookup  │  │
//!              │  ├───────────────────────┤  │
//!              │  │ Auth plugin           │  │
//!              │  ├───────────────────────┤  │
//!              │  │ Idempotency guard     │  │
//!              │  ├───────────────────────┤  │
//!              │  │ Load balancer + retry │  │
//!              │  └───────────────────────┘  │
//!              └─────────────────────────────┘
//! ```
//!
//! ## Core Behaviors
//!
//! - **Prefix routing**: longest matching `request_path` wins; resolved
//!   routes are cached in the shared store with pattern-based
//!   invalidation per upstream.
//! - **Per-route auth**: no-auth, HTTP Basic, API key, or verified admin
//!   JWT, selected by the route's plugin code.
//! - **At-most-once writes**: requests carrying `Idempotency-Key` forward
//!   exactly once; duplicates replay the cached response or get a 409.
//! - **Bounded retries**: up to `retries + 1` attempts per request, each
//!   re-running node selection under the upstream's timeout.
//! - **Origin throttling**: 25 non-GET requests per second per origin,
//!   then a 20-second block, enforced across instances.
//!
//! ## Module Organization
//!
//! - [`cache`] - shared key-value cache facade (memory / Redis)
//! - [`config`] - environment settings and snapshot loading
//! - [`logs`] - logger configuration
//! - [`middleware`] - DDoS blocker and security headers
//! - [`models`] - domain types, settings, and the error taxonomy
//! - [`plugins`] - per-route authentication checks
//! - [`routes`] - HTTP surface: catch-all proxy and health probes
//! - [`services`] - route cache, load balancer, idempotency guard,
//!   access log, and the request handler that ties them together
//! - [`store`] - read-only config store
//! - [`utils`] - path and origin helpers

pub mod cache;
pub mod config;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod plugins;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;
