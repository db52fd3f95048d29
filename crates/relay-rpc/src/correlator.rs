//! Reply Correlator - the requesting side of an exchange.
//!
//! Flow:
//! 1. Subscribe to the caller's reply channel
//! 2. Publish the request on the shared request channel
//! 3. Await the first message on the reply channel, bounded by a deadline
//! 4. Unsubscribe, whatever the outcome

use crate::error::RpcError;
use crate::naming::ChannelId;
use crate::shutdown::signalled;
use relay_bus::{MessageBody, PubSubTransport, Subscription, TransportError};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

/// Default bound on the wait for a reply.
pub const DEFAULT_REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// Statistics for the correlator
#[derive(Debug, Default)]
pub struct CorrelatorStats {
    /// Exchanges started
    pub started: AtomicU64,
    /// Exchanges that returned a reply
    pub completed: AtomicU64,
    /// Exchanges that hit the deadline
    pub timeouts: AtomicU64,
    /// Exchanges that failed in the transport
    pub transport_errors: AtomicU64,
    /// Exchanges cancelled through the cancel signal
    pub cancelled: AtomicU64,
    /// Requests no subscriber received
    pub unheard: AtomicU64,
}

impl CorrelatorStats {
    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> CorrelatorSnapshot {
        CorrelatorSnapshot {
            started: self.started.load(Ordering::Relaxed),
            completed: self.completed.load(Ordering::Relaxed),
            timeouts: self.timeouts.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            cancelled: self.cancelled.load(Ordering::Relaxed),
            unheard: self.unheard.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`CorrelatorStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CorrelatorSnapshot {
    pub started: u64,
    pub completed: u64,
    pub timeouts: u64,
    pub transport_errors: u64,
    pub cancelled: u64,
    pub unheard: u64,
}

/// Performs request/reply exchanges over a shared transport.
///
/// Exchanges share nothing but the transport: each one listens on its own
/// reply channel, so any number may run concurrently.
pub struct ReplyCorrelator {
    transport: Arc<dyn PubSubTransport>,
    default_timeout: Duration,
    stats: Arc<CorrelatorStats>,
}

impl ReplyCorrelator {
    pub fn new(transport: Arc<dyn PubSubTransport>, default_timeout: Duration) -> Self {
        Self {
            transport,
            default_timeout,
            stats: Arc::new(CorrelatorStats::default()),
        }
    }

    /// Send `payload` to `request_channel` and wait for one reply on
    /// `reply_channel`.
    ///
    /// `timeout` falls back to the correlator's default. A reply that is not
    /// valid JSON is returned as [`MessageBody::Raw`]. Dropping the returned
    /// future releases the reply subscription.
    pub async fn request_reply(
        &self,
        payload: MessageBody,
        request_channel: &str,
        reply_channel: &ChannelId,
        timeout: Option<Duration>,
    ) -> Result<MessageBody, RpcError> {
        self.exchange(payload, request_channel, reply_channel, timeout, None)
            .await
    }

    /// Like [`request_reply`](Self::request_reply), but gives up with
    /// [`RpcError::Cancelled`] once `cancel` reads `true`.
    pub async fn request_reply_cancellable(
        &self,
        payload: MessageBody,
        request_channel: &str,
        reply_channel: &ChannelId,
        timeout: Option<Duration>,
        cancel: watch::Receiver<bool>,
    ) -> Result<MessageBody, RpcError> {
        self.exchange(payload, request_channel, reply_channel, timeout, Some(cancel))
            .await
    }

    /// Get the default reply timeout.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Get statistics
    pub fn stats(&self) -> &CorrelatorStats {
        &self.stats
    }

    async fn exchange(
        &self,
        payload: MessageBody,
        request_channel: &str,
        reply_channel: &ChannelId,
        timeout: Option<Duration>,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<MessageBody, RpcError> {
        let timeout = timeout.unwrap_or(self.default_timeout);
        self.stats.started.fetch_add(1, Ordering::Relaxed);

        // Must be listening before the request goes out: a reply published
        // earlier is lost.
        let mut subscription = match self.transport.subscribe(reply_channel.as_str()).await {
            Ok(subscription) => subscription,
            Err(e) => {
                self.stats.transport_errors.fetch_add(1, Ordering::Relaxed);
                return Err(e.into());
            }
        };

        let result = self
            .publish_and_wait(&mut subscription, payload, request_channel, timeout, cancel)
            .await;

        let released = self.transport.unsubscribe(subscription).await;
        let result = match (result, released) {
            (result, Ok(())) => result,
            (Ok(_), Err(e)) => {
                warn!(
                    reply_channel = %reply_channel,
                    error = %e,
                    "Failed to release reply subscription"
                );
                Err(e.into())
            }
            // The exchange already failed; that error is the one reported.
            (Err(primary), Err(e)) => {
                warn!(
                    reply_channel = %reply_channel,
                    error = %e,
                    "Failed to release reply subscription"
                );
                Err(primary)
            }
        };

        let counter = match &result {
            Ok(_) => &self.stats.completed,
            Err(RpcError::Timeout { .. }) => &self.stats.timeouts,
            Err(RpcError::Transport(_)) => &self.stats.transport_errors,
            Err(RpcError::Cancelled { .. }) => &self.stats.cancelled,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        result
    }

    async fn publish_and_wait(
        &self,
        subscription: &mut Subscription,
        payload: MessageBody,
        request_channel: &str,
        timeout: Duration,
        cancel: Option<watch::Receiver<bool>>,
    ) -> Result<MessageBody, RpcError> {
        let reply_channel = subscription.channel().to_string();
        if cancel.as_ref().is_some_and(|cancel| *cancel.borrow()) {
            debug!(reply_channel = %reply_channel, "Request cancelled before publish");
            return Err(RpcError::Cancelled {
                channel: reply_channel,
            });
        }
        let message = payload.encode();

        let received = self
            .transport
            .publish(request_channel, message.clone())
            .await?;
        if received == 0 {
            // No retry: the deadline below is the failure signal.
            self.stats.unheard.fetch_add(1, Ordering::Relaxed);
            warn!(
                request_channel = request_channel,
                reply_channel = %reply_channel,
                message = %message,
                "Request was not received by any subscriber"
            );
        } else {
            debug!(
                request_channel = request_channel,
                receivers = received,
                message = %message,
                "Request published"
            );
        }

        debug!(reply_channel = %reply_channel, "Waiting for one reply");
        let first_reply = async {
            match subscription.recv().await {
                Some(text) => {
                    debug!(reply_channel = %reply_channel, reply = %text, "Received reply");
                    Ok(MessageBody::decode(&text))
                }
                None => Err(RpcError::Transport(TransportError::ConnectionClosed)),
            }
        };
        let bounded = tokio::time::timeout(timeout, first_reply);

        let outcome = match cancel {
            Some(mut cancel) => {
                tokio::select! {
                    outcome = bounded => outcome,
                    _ = signalled(&mut cancel) => {
                        debug!(reply_channel = %reply_channel, "Request cancelled");
                        return Err(RpcError::Cancelled {
                            channel: reply_channel.clone(),
                        });
                    }
                }
            }
            None => bounded.await,
        };

        match outcome {
            Ok(result) => result,
            Err(_) => {
                debug!(
                    reply_channel = %reply_channel,
                    timeout_ms = timeout.as_millis() as u64,
                    "Request timed out"
                );
                Err(RpcError::Timeout {
                    channel: reply_channel,
                    timeout,
                })
            }
        }
    }
}
