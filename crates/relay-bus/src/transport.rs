//! # Transport Contract
//!
//! The subscribe/unsubscribe/publish primitives the correlator and responder
//! are written against.

use crate::subscription::Subscription;
use async_trait::async_trait;
use thiserror::Error;

/// Connection-level transport failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The connection to the transport is gone.
    #[error("Transport connection closed")]
    ConnectionClosed,

    /// A subscription could not be established.
    #[error("Subscribe to '{channel}' failed: {reason}")]
    SubscribeFailed { channel: String, reason: String },

    /// A message could not be handed to the transport.
    #[error("Publish to '{channel}' failed: {reason}")]
    PublishFailed { channel: String, reason: String },

    /// A subscription could not be released.
    #[error("Unsubscribe from '{channel}' failed: {reason}")]
    UnsubscribeFailed { channel: String, reason: String },
}

/// Trait for publish/subscribe transports.
///
/// Implementations must be safe to share between one long-lived responder and
/// any number of concurrent request/reply exchanges.
#[async_trait]
pub trait PubSubTransport: Send + Sync {
    /// Subscribe to a named channel.
    ///
    /// The returned handle only sees messages published after this call
    /// resolves.
    async fn subscribe(&self, channel: &str) -> Result<Subscription, TransportError>;

    /// Release a subscription.
    ///
    /// Consumes the handle, so a handle can never be released twice. Must
    /// succeed during teardown, including after the connection closed.
    async fn unsubscribe(&self, subscription: Subscription) -> Result<(), TransportError>;

    /// Publish a text payload to a named channel.
    ///
    /// # Returns
    ///
    /// The number of subscribers that received the payload. Zero is a valid
    /// result, not an error.
    async fn publish(&self, channel: &str, payload: String) -> Result<usize, TransportError>;
}
