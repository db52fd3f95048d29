//! # Relay RPC - Request/Reply over Publish/Subscribe
//!
//! Correlates a single reply with a request published on a shared channel.
//!
//! ## Flow
//!
//! ```text
//! ReplyCorrelator                      Transport                ResponderWorker
//!       │ subscribe(reply-7)              │                            │
//!       │ ──────────────────────────────→ │                            │
//!       │ publish(mychannel, envelope)    │                            │
//!       │ ──────────────────────────────→ │ ─────────────────────────→ │
//!       │                                 │        (processing delay)  │
//!       │                                 │ ←───────────────────────── │
//!       │ ←────────────────────────────── │  publish(reply-7, response)│
//!       │ unsubscribe(reply-7)            │                            │
//! ```
//!
//! ## Guarantees
//!
//! - The reply subscription exists before the request is published
//! - At most one reply is read per exchange
//! - The reply subscription is released on success, timeout and cancellation

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod correlator;
pub mod envelope;
pub mod error;
pub mod naming;
pub mod responder;
pub mod shutdown;

pub use correlator::{CorrelatorSnapshot, CorrelatorStats, ReplyCorrelator, DEFAULT_REPLY_TIMEOUT};
pub use envelope::{RequestEnvelope, ResponseEnvelope};
pub use error::RpcError;
pub use naming::{new_reply_channel, ChannelId, ReplyChannelNamer, ReplyTicket};
pub use responder::{
    ResponderConfig, ResponderSnapshot, ResponderStats, ResponderWorker, WorkerState,
    DEFAULT_PROCESSING_DELAY, DEFAULT_REQUEST_CHANNEL,
};
