//! Data models and domain types for the relay-rs gateway.
//!
//! - [`gateway`] - upstreams, targets, routes, consumers, and the resolved
//!   route blob the route cache stores
//! - [`error`] - the gateway error taxonomy and its HTTP mapping
//! - [`settings`] - environment-driven runtime settings

pub mod error;
pub mod gateway;
pub mod settings;
