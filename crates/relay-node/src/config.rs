//! # Node Configuration
//!
//! Unified configuration for the transport, the request/reply layer and the
//! HTTP facade.
//!
//! All values have defaults; environment variables override them.

use relay_bus::DEFAULT_CHANNEL_CAPACITY;
use relay_rpc::{ResponderConfig, DEFAULT_REQUEST_CHANNEL};
use serde::{Deserialize, Serialize};
use std::env;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Complete node configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// HTTP facade configuration.
    pub http: HttpConfig,
    /// Transport configuration.
    pub bus: BusConfig,
    /// Request/reply configuration.
    pub rpc: RpcConfig,
}

/// Configuration errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("request channel must not be empty")]
    EmptyRequestChannel,
    #[error("reply channel prefix must not be empty")]
    EmptyReplyPrefix,
    #[error("reply timeout must be greater than zero")]
    ZeroTimeout,
    #[error("channel capacity must be greater than zero")]
    ZeroCapacity,
}

/// HTTP facade configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Listen address.
    pub bind_addr: SocketAddr,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 5000)),
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Messages buffered per subscriber before copies are dropped.
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Request/reply configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcConfig {
    /// Shared channel requests are published on.
    pub request_channel: String,
    /// Prefix of per-request reply channels.
    pub reply_prefix: String,
    /// Bound on the wait for a reply, in milliseconds.
    pub reply_timeout_ms: u64,
    /// Responder delay before each reply, in milliseconds.
    pub processing_delay_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            request_channel: DEFAULT_REQUEST_CHANNEL.to_string(),
            reply_prefix: "myreplychannel".to_string(),
            reply_timeout_ms: 5_000,
            processing_delay_ms: 500,
        }
    }
}

impl RpcConfig {
    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }
}

impl NodeConfig {
    /// Load configuration from the process environment.
    ///
    /// # Environment Variables
    ///
    /// - `RELAY_HTTP_ADDR`: listen address (default: 0.0.0.0:5000)
    /// - `RELAY_CHANNEL_CAPACITY`: per-subscriber buffer (default: 1000)
    /// - `RELAY_REQUEST_CHANNEL`: shared request channel (default: mychannel)
    /// - `RELAY_REPLY_PREFIX`: reply channel prefix (default: myreplychannel)
    /// - `RELAY_REPLY_TIMEOUT_MS`: reply wait bound (default: 5000)
    /// - `RELAY_PROCESSING_DELAY_MS`: responder delay (default: 500)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable source.
    ///
    /// Unparsable values are logged and ignored.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        override_from(&lookup, "RELAY_HTTP_ADDR", &mut config.http.bind_addr);
        override_from(
            &lookup,
            "RELAY_CHANNEL_CAPACITY",
            &mut config.bus.channel_capacity,
        );
        override_from(
            &lookup,
            "RELAY_REQUEST_CHANNEL",
            &mut config.rpc.request_channel,
        );
        override_from(&lookup, "RELAY_REPLY_PREFIX", &mut config.rpc.reply_prefix);
        override_from(
            &lookup,
            "RELAY_REPLY_TIMEOUT_MS",
            &mut config.rpc.reply_timeout_ms,
        );
        override_from(
            &lookup,
            "RELAY_PROCESSING_DELAY_MS",
            &mut config.rpc.processing_delay_ms,
        );

        config
    }

    /// Validate configuration before wiring the node.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rpc.request_channel.is_empty() {
            return Err(ConfigError::EmptyRequestChannel);
        }
        if self.rpc.reply_prefix.is_empty() {
            return Err(ConfigError::EmptyReplyPrefix);
        }
        if self.rpc.reply_timeout_ms == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.bus.channel_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        Ok(())
    }

    /// Responder settings derived from this configuration.
    pub fn responder_config(&self) -> ResponderConfig {
        ResponderConfig {
            request_channel: self.rpc.request_channel.clone(),
            processing_delay: self.rpc.processing_delay(),
        }
    }
}

fn override_from<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    target: &mut T,
) {
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.parse() {
        Ok(value) => *target = value,
        Err(_) => warn!(variable = key, value = %raw, "Ignoring unparsable environment override"),
    }
}
