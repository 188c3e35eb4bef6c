//! Service layer: the gateway's core business logic.
//!
//! - [`http`] - request orchestration and upstream forwarding
//! - [`route_cache`] - fingerprinted cache of resolved routes
//! - [`load_balancer`] - per-upstream node selection
//! - [`idempotency`] - at-most-once guard for keyed requests
//! - [`access_log`] - fire-and-forget per-request records
//!
//! The pipeline a request walks through:
//!
//! ```text
//! DDoS middleware → path validate → route lookup → plugin check →
//!   idempotency guard → load-balanced forward (retries) → translate
//! ```
//!
//! Everything that must be shared across gateway instances (counters,
//! markers, cached routes) lives behind the cache adapter, never in
//! process memory.

pub mod access_log;
pub mod http;
pub mod idempotency;
pub mod load_balancer;
pub mod route_cache;
