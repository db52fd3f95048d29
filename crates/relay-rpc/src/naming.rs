//! Reply channel naming.
//!
//! A reply channel must not collide with any other outstanding request's.
//! Two sources are provided: [`new_reply_channel`] appends a UUID v7 to a
//! seed, and [`ReplyChannelNamer`] hands out sequential names from a counter
//! owned by whoever issues requests.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Name of a pub/sub channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Wrap an existing channel name.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the underlying string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ChannelId {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl From<&str> for ChannelId {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive a fresh reply channel from `seed`.
///
/// The UUID v7 suffix makes every call distinct, so no shared state is needed.
pub fn new_reply_channel(seed: &str) -> ChannelId {
    ChannelId(format!("{}.{}", seed, Uuid::now_v7()))
}

/// A request number paired with its reply channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTicket {
    /// Sequential request number, starting at 1.
    pub request_number: u64,
    /// `<prefix><request_number>`.
    pub channel: ChannelId,
}

/// Sequential reply channel allocator.
///
/// Numbers are unique for the lifetime of the namer; share one namer per
/// request issuer rather than a process-wide counter.
#[derive(Debug)]
pub struct ReplyChannelNamer {
    prefix: String,
    next: AtomicU64,
}

impl ReplyChannelNamer {
    /// Create a namer whose first ticket is number 1.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }

    /// Allocate the next ticket.
    pub fn next_ticket(&self) -> ReplyTicket {
        let request_number = self.next.fetch_add(1, Ordering::Relaxed);
        ReplyTicket {
            request_number,
            channel: ChannelId(format!("{}{}", self.prefix, request_number)),
        }
    }

    /// Get the channel prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
