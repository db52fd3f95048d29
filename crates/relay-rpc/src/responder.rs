//! Responder Worker - the answering side of an exchange.
//!
//! Consumes the shared request channel for the life of the process and
//! republishes each request's `response` to its `response_channel`.
//!
//! ```text
//! Idle → Subscribed → Listening ⇄ Processing
//!                         │
//!                         ↓ (shutdown signal or transport closed)
//!                   Unsubscribing → Terminated
//! ```

use crate::envelope::{RequestEnvelope, ResponseEnvelope};
use crate::error::RpcError;
use crate::shutdown::signalled;
use relay_bus::{MessageBody, PubSubTransport, Subscription, TransportError};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Shared request channel the responder listens on by default.
pub const DEFAULT_REQUEST_CHANNEL: &str = "mychannel";

/// Default delay before each reply is sent.
pub const DEFAULT_PROCESSING_DELAY: Duration = Duration::from_millis(500);

/// Lifecycle of a [`ResponderWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    Idle,
    Subscribed,
    Listening,
    Processing,
    Unsubscribing,
    Terminated,
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Subscribed => "subscribed",
            Self::Listening => "listening",
            Self::Processing => "processing",
            Self::Unsubscribing => "unsubscribing",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Responder configuration.
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    /// Shared channel requests arrive on.
    pub request_channel: String,
    /// Delay applied to each reply. Only that reply waits; the worker keeps
    /// consuming the request channel meanwhile.
    pub processing_delay: Duration,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            request_channel: DEFAULT_REQUEST_CHANNEL.to_string(),
            processing_delay: DEFAULT_PROCESSING_DELAY,
        }
    }
}

/// Statistics for the responder
#[derive(Debug, Default)]
pub struct ResponderStats {
    /// Messages read from the request channel
    pub received: AtomicU64,
    /// Replies handed to the transport
    pub replied: AtomicU64,
    /// Messages skipped for not being a request envelope
    pub malformed: AtomicU64,
    /// Replies no subscriber received
    pub undelivered: AtomicU64,
    /// Replies the transport refused
    pub publish_errors: AtomicU64,
}

impl ResponderStats {
    /// Point-in-time copy of the counters.
    pub fn snapshot(&self) -> ResponderSnapshot {
        ResponderSnapshot {
            received: self.received.load(Ordering::Relaxed),
            replied: self.replied.load(Ordering::Relaxed),
            malformed: self.malformed.load(Ordering::Relaxed),
            undelivered: self.undelivered.load(Ordering::Relaxed),
            publish_errors: self.publish_errors.load(Ordering::Relaxed),
        }
    }
}

/// Serializable copy of [`ResponderStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResponderSnapshot {
    pub received: u64,
    pub replied: u64,
    pub malformed: u64,
    pub undelivered: u64,
    pub publish_errors: u64,
}

/// Long-lived worker answering requests from the shared channel.
///
/// Never stops on malformed input or on replies nobody hears. Stops on the
/// shutdown signal (returns `Ok`) or when the transport closes (returns
/// `Err`), releasing its subscription either way.
pub struct ResponderWorker {
    transport: Arc<dyn PubSubTransport>,
    config: ResponderConfig,
    stats: Arc<ResponderStats>,
    state: watch::Sender<WorkerState>,
}

impl ResponderWorker {
    pub fn new(transport: Arc<dyn PubSubTransport>, config: ResponderConfig) -> Self {
        let (state, _) = watch::channel(WorkerState::Idle);
        Self {
            transport,
            config,
            stats: Arc::new(ResponderStats::default()),
            state,
        }
    }

    /// Watch the worker's lifecycle.
    pub fn state(&self) -> watch::Receiver<WorkerState> {
        self.state.subscribe()
    }

    /// Get statistics
    pub fn stats(&self) -> Arc<ResponderStats> {
        Arc::clone(&self.stats)
    }

    pub fn config(&self) -> &ResponderConfig {
        &self.config
    }

    /// Run until `shutdown` reads `true` or the transport closes.
    pub async fn run(
        self,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<ResponderSnapshot, RpcError> {
        let channel = self.config.request_channel.clone();

        let mut subscription = match self.transport.subscribe(&channel).await {
            Ok(subscription) => subscription,
            Err(e) => {
                error!(channel = %channel, error = %e, "Responder failed to subscribe");
                self.set_state(WorkerState::Terminated);
                return Err(e.into());
            }
        };
        self.set_state(WorkerState::Subscribed);
        info!(
            channel = %channel,
            processing_delay_ms = self.config.processing_delay.as_millis() as u64,
            "Responder subscribed"
        );

        let mut replies = JoinSet::new();
        let outcome = self
            .listen(&mut subscription, &mut replies, &mut shutdown)
            .await;

        self.set_state(WorkerState::Unsubscribing);
        if !replies.is_empty() {
            debug!(pending = replies.len(), "Aborting in-flight replies");
        }
        replies.shutdown().await;
        if let Err(e) = self.transport.unsubscribe(subscription).await {
            warn!(channel = %channel, error = %e, "Responder failed to unsubscribe");
        }
        self.set_state(WorkerState::Terminated);

        let snapshot = self.stats.snapshot();
        info!(
            channel = %channel,
            received = snapshot.received,
            replied = snapshot.replied,
            malformed = snapshot.malformed,
            "Responder terminated"
        );
        outcome.map(|()| snapshot)
    }

    async fn listen(
        &self,
        subscription: &mut Subscription,
        replies: &mut JoinSet<()>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<(), RpcError> {
        self.set_state(WorkerState::Listening);

        loop {
            tokio::select! {
                biased;

                _ = signalled(shutdown) => {
                    info!(channel = subscription.channel(), "Responder shutdown signal received");
                    return Ok(());
                }

                Some(joined) = replies.join_next(), if !replies.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "Reply task panicked");
                        }
                    }
                }

                message = subscription.recv() => match message {
                    Some(text) => self.handle_message(subscription.channel(), &text, replies),
                    None => {
                        error!(channel = subscription.channel(), "Transport closed, responder stopping");
                        return Err(TransportError::ConnectionClosed.into());
                    }
                },
            }
        }
    }

    fn handle_message(&self, channel: &str, text: &str, replies: &mut JoinSet<()>) {
        self.set_state(WorkerState::Processing);
        self.stats.received.fetch_add(1, Ordering::Relaxed);
        debug!(channel = channel, message = %text, "Request received");

        let body = MessageBody::decode(text);
        match RequestEnvelope::from_body(&body) {
            Some(envelope) => {
                let response = envelope.into_response();
                let transport = Arc::clone(&self.transport);
                let stats = Arc::clone(&self.stats);
                let delay = self.config.processing_delay;
                replies.spawn(async move {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    deliver(transport.as_ref(), &stats, response).await;
                });
            }
            None => {
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                warn!(
                    channel = channel,
                    structured = body.is_structured(),
                    "Message is not a request envelope, skipping"
                );
            }
        }

        self.set_state(WorkerState::Listening);
    }

    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }
}

async fn deliver(transport: &dyn PubSubTransport, stats: &ResponderStats, response: ResponseEnvelope) {
    let channel = response.response_channel;
    let payload = response.response_body.encode();
    debug!(channel = %channel, response = %payload, "Sending response");

    match transport.publish(channel.as_str(), payload).await {
        Ok(received) => {
            stats.replied.fetch_add(1, Ordering::Relaxed);
            if received == 0 {
                stats.undelivered.fetch_add(1, Ordering::Relaxed);
                warn!(channel = %channel, receivers = 0, "Response was not received by any subscriber");
            } else {
                debug!(channel = %channel, receivers = received, "Response delivered");
            }
        }
        Err(e) => {
            stats.publish_errors.fetch_add(1, Ordering::Relaxed);
            error!(channel = %channel, error = %e, "Failed to publish response");
        }
    }
}
