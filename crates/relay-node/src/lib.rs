//! # Relay Node Library
//!
//! Exposes the node's wiring for tests. The entry point is the `main.rs`
//! binary.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging
//! 2. Load configuration from the environment and validate it
//! 3. Start the responder and wait until it listens on the request channel
//! 4. Serve the HTTP facade until Ctrl+C
//! 5. Stop the responder and release its subscription

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod config;
pub mod facade;
pub mod runtime;

pub use config::{BusConfig, ConfigError, HttpConfig, NodeConfig, RpcConfig};
pub use facade::{health_status, router, FacadeError, FacadeState, GREETING};
pub use runtime::{NodeRuntime, RuntimeError};
