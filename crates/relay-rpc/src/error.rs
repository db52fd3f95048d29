//! Errors surfaced by a request/reply exchange.

use relay_bus::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Request/reply failures.
///
/// Malformed reply bodies are not an error: they come back as
/// [`relay_bus::MessageBody::Raw`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// No reply arrived within the deadline.
    #[error("No reply on '{channel}' within {timeout:?}")]
    Timeout { channel: String, timeout: Duration },

    /// Subscribe, publish or receive failed at the connection level.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The exchange was cancelled before a reply arrived.
    #[error("Request awaiting '{channel}' was cancelled")]
    Cancelled { channel: String },
}

impl RpcError {
    /// Whether this is a deadline expiry.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
