//! Configuration loading for the relay-rs gateway.
//!
//! Process wiring comes from `RELAY_*` environment variables; the
//! route/upstream/consumer snapshot comes from a JSON file maintained by
//! the operator surface. Both are loaded once at startup and validated
//! before the server binds.

pub mod settings;
