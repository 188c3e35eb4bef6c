//! Logging configuration for the relay-rs gateway.
//!
//! One formatter serves the whole process: timestamped, aligned,
//! optionally colored lines through the `log` facade. Access records are
//! emitted under the dedicated `access` target by
//! [`services::access_log`](crate::services::access_log), so deployments
//! can filter or redirect them independently (`RUST_LOG=access=info`).

pub mod logger;
