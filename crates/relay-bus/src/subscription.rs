//! # Subscription Handle
//!
//! Defines the receiving side of the transport.

use crate::transport::TransportError;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use uuid::Uuid;

/// Identifier of one subscription, unique across the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    /// Generate a new random subscription ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bookkeeping a transport keeps for its live subscriptions.
///
/// `release` is synchronous so it can run from `Drop`.
pub trait SubscriptionRegistry: Send + Sync {
    /// Forget the subscription `id` on `channel`.
    fn release(&self, channel: &str, id: SubscriptionId);
}

/// A subscription handle for receiving messages on one channel.
///
/// Exclusively owned by its creator. When dropped without being
/// unsubscribed, the registration is released automatically.
pub struct Subscription {
    id: SubscriptionId,
    channel: String,
    receiver: mpsc::Receiver<String>,
    /// `None` once released.
    registry: Option<Arc<dyn SubscriptionRegistry>>,
}

impl Subscription {
    /// Create a new subscription handle.
    pub fn new(
        id: SubscriptionId,
        channel: impl Into<String>,
        receiver: mpsc::Receiver<String>,
        registry: Arc<dyn SubscriptionRegistry>,
    ) -> Self {
        Self {
            id,
            channel: channel.into(),
            receiver,
            registry: Some(registry),
        }
    }

    /// Get the subscription ID.
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Get the channel this subscription listens on.
    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Receive the next message.
    ///
    /// # Returns
    ///
    /// - `Some(text)` - The next message
    /// - `None` - The transport connection closed
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }

    /// Try to receive the next message without waiting.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(text))` - A message was buffered
    /// - `Ok(None)` - Nothing buffered
    /// - `Err(TransportError::ConnectionClosed)` - The transport closed
    pub fn try_recv(&mut self) -> Result<Option<String>, TransportError> {
        match self.receiver.try_recv() {
            Ok(text) => Ok(Some(text)),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(TransportError::ConnectionClosed),
        }
    }

    /// Convert into a stream of messages.
    #[must_use]
    pub fn into_stream(self) -> MessageStream {
        MessageStream { subscription: self }
    }

    /// Release the registration. Subsequent calls and the eventual drop are no-ops.
    pub fn release(mut self) {
        self.release_registration();
    }

    fn release_registration(&mut self) {
        if let Some(registry) = self.registry.take() {
            registry.release(&self.channel, self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("channel", &self.channel)
            .field("released", &self.registry.is_none())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_registration();
    }
}

/// A stream wrapper for subscriptions.
///
/// Infinite while the transport is connected; ends once it closes and is not
/// restartable.
pub struct MessageStream {
    subscription: Subscription,
}

impl MessageStream {
    /// Get the channel this stream listens on.
    #[must_use]
    pub fn channel(&self) -> &str {
        self.subscription.channel()
    }

    /// Recover the underlying subscription handle.
    #[must_use]
    pub fn into_inner(self) -> Subscription {
        self.subscription
    }
}

impl Stream for MessageStream {
    type Item = String;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.subscription.receiver.poll_recv(cx)
    }
}
