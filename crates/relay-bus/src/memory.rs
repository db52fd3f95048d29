//! # In-Memory Transport
//!
//! Single-process implementation of [`PubSubTransport`].

use crate::subscription::{Subscription, SubscriptionId, SubscriptionRegistry};
use crate::transport::{PubSubTransport, TransportError};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

type ChannelMap = HashMap<String, HashMap<SubscriptionId, mpsc::Sender<String>>>;

/// Live subscriptions by channel name.
#[derive(Default)]
struct ChannelRegistry {
    channels: RwLock<ChannelMap>,
    released: AtomicU64,
}

impl SubscriptionRegistry for ChannelRegistry {
    fn release(&self, channel: &str, id: SubscriptionId) {
        self.released.fetch_add(1, Ordering::Relaxed);

        let Ok(mut channels) = self.channels.write() else {
            return;
        };
        let Some(subscribers) = channels.get_mut(channel) else {
            debug!(channel = channel, subscription = %id, "Subscription released");
            return;
        };

        subscribers.remove(&id);
        if subscribers.is_empty() {
            channels.remove(channel);
        }
        debug!(channel = channel, subscription = %id, "Subscription released");
    }
}

/// In-memory implementation of the publish/subscribe transport.
///
/// Each subscription owns a bounded `tokio::sync::mpsc` buffer. Publishing
/// never waits: a copy that does not fit is dropped for that subscriber only.
/// Suitable for single-process operation; a networked broker would sit
/// behind the same trait.
pub struct InMemoryPubSub {
    /// Live subscriptions, shared with every handle for release on drop.
    registry: Arc<ChannelRegistry>,

    /// Set once the connection is closed.
    closed: AtomicBool,

    /// Total publish calls accepted.
    messages_published: AtomicU64,

    /// Per-subscriber buffer capacity.
    capacity: usize,
}

impl InMemoryPubSub {
    /// Create a new in-memory transport with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory transport with specified per-subscriber capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            registry: Arc::new(ChannelRegistry::default()),
            closed: AtomicBool::new(false),
            messages_published: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Close the connection.
    ///
    /// Every later subscribe or publish fails with
    /// [`TransportError::ConnectionClosed`], and every live subscription's
    /// message sequence ends.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut channels) = self.registry.channels.write() {
            // Dropping the senders ends every receiver.
            channels.clear();
        }
        warn!("In-memory transport closed");
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Get the number of live subscriptions on a channel.
    #[must_use]
    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.registry
            .channels
            .read()
            .map(|channels| channels.get(channel).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    /// Get the number of live subscriptions across all channels.
    #[must_use]
    pub fn active_subscriptions(&self) -> usize {
        self.registry
            .channels
            .read()
            .map(|channels| channels.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    /// Get the total number of publish calls accepted.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Get the total number of subscriptions released.
    #[must_use]
    pub fn subscriptions_released(&self) -> u64 {
        self.registry.released.load(Ordering::Relaxed)
    }

    /// Get the per-subscriber capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryPubSub {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PubSubTransport for InMemoryPubSub {
    async fn subscribe(&self, channel: &str) -> Result<Subscription, TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }

        let id = SubscriptionId::new();
        let (sender, receiver) = mpsc::channel(self.capacity);

        {
            let mut channels =
                self.registry
                    .channels
                    .write()
                    .map_err(|_| TransportError::SubscribeFailed {
                        channel: channel.to_string(),
                        reason: "registry lock poisoned".into(),
                    })?;
            // `close` may have cleared the map since the check above.
            if self.is_closed() {
                return Err(TransportError::ConnectionClosed);
            }
            channels
                .entry(channel.to_string())
                .or_default()
                .insert(id, sender);
        }

        debug!(channel = channel, subscription = %id, "New subscription created");

        let registry: Arc<dyn SubscriptionRegistry> = self.registry.clone();
        Ok(Subscription::new(id, channel, receiver, registry))
    }

    async fn unsubscribe(&self, subscription: Subscription) -> Result<(), TransportError> {
        subscription.release();
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<usize, TransportError> {
        if self.is_closed() {
            return Err(TransportError::ConnectionClosed);
        }

        let channels = self
            .registry
            .channels
            .read()
            .map_err(|_| TransportError::PublishFailed {
                channel: channel.to_string(),
                reason: "registry lock poisoned".into(),
            })?;

        self.messages_published.fetch_add(1, Ordering::Relaxed);

        let Some(subscribers) = channels.get(channel) else {
            debug!(channel = channel, receivers = 0, "Message published");
            return Ok(0);
        };

        let mut received = 0;
        for (id, sender) in subscribers {
            match sender.try_send(payload.clone()) {
                Ok(()) => received += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(
                        channel = channel,
                        subscription = %id,
                        "Subscriber buffer full, message dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }

        debug!(channel = channel, receivers = received, "Message published");
        Ok(received)
    }
}
