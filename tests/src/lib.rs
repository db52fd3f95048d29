//! # Relay Test Suite
//!
//! Cross-crate tests for the relay workspace.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── relay_benchmarks.rs   # Naming, codec and round-trip latency
//! └── src/integration/
//!     ├── exchange_flows.rs     # Correlator and responder over the bus
//!     ├── failure_modes.rs      # Timeouts, cancellation, transport loss
//!     └── http_facade.rs        # The node's HTTP surface end to end
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p relay-tests
//!
//! # By area
//! cargo test -p relay-tests integration::failure_modes
//!
//! # Benchmarks
//! cargo bench -p relay-tests
//! ```
