//! # Relay Bus - Named-Channel Publish/Subscribe Transport
//!
//! The transport layer the request/reply protocol runs on top of.
//!
//! ## Delivery Model
//!
//! - **Fan-out:** every current subscriber of a channel receives a copy
//! - **At-most-once:** a copy that does not fit a subscriber's buffer is dropped
//! - **Non-durable:** a message published before anyone subscribes is lost
//!
//! ```text
//! ┌──────────────┐  publish("mychannel")   ┌──────────────┐
//! │  Requester   │ ──────────────────────→ │  Responder   │
//! │              │                         │              │
//! │              │ ←────────────────────── │              │
//! └──────────────┘  publish("reply-1")     └──────────────┘
//!        ↑                                        ↑
//!        └────── subscribe("reply-1")             └── subscribe("mychannel")
//! ```
//!
//! ## Handles
//!
//! A [`Subscription`] is owned by whoever subscribed. It is released exactly
//! once: through [`PubSubTransport::unsubscribe`], or on drop when its owner
//! was cancelled before it could unsubscribe.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod memory;
pub mod message;
pub mod subscription;
pub mod transport;

// Re-export main types
pub use memory::InMemoryPubSub;
pub use message::MessageBody;
pub use subscription::{MessageStream, Subscription, SubscriptionId};
pub use transport::{PubSubTransport, TransportError};

/// Maximum messages to buffer per subscriber before copies are dropped.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
