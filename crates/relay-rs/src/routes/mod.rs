//! HTTP surface of the gateway.
//!
//! - [`health`] - health, readiness and liveness probes
//! - [`http`] - the catch-all proxy route every client request lands on
//!
//! All proxy behavior is decided by path and headers; the catch-all
//! pattern `/{tail:.*}` hands everything to the
//! [`RouteHandler`](crate::services::http::RouteHandler).

pub mod health;
pub mod http;
