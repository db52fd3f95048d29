//! Wire envelopes exchanged on the shared request channel.
//!
//! ```text
//! { "response": <any>, "response_channel": "<string>" }
//! ```

use crate::naming::ChannelId;
use relay_bus::MessageBody;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request as published on the shared channel.
///
/// `response` is the body the responder should send back, and
/// `response_channel` is where the requester listens for it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    pub response: Value,
    pub response_channel: ChannelId,
}

impl RequestEnvelope {
    /// Create a new envelope.
    pub fn new(response: Value, response_channel: ChannelId) -> Self {
        Self {
            response,
            response_channel,
        }
    }

    /// Encode as a structured message body.
    pub fn to_body(&self) -> MessageBody {
        MessageBody::Structured(serde_json::json!({
            "response": self.response,
            "response_channel": self.response_channel,
        }))
    }

    /// Interpret a received body as a request.
    ///
    /// Returns `None` for raw text, non-object JSON, a missing key, or a
    /// `response_channel` that is not a string.
    pub fn from_body(body: &MessageBody) -> Option<Self> {
        let value = body.as_structured()?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Turn into the response the responder publishes.
    pub fn into_response(self) -> ResponseEnvelope {
        ResponseEnvelope {
            response_channel: self.response_channel,
            response_body: MessageBody::Structured(self.response),
        }
    }
}

/// A response addressed to a reply channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEnvelope {
    pub response_channel: ChannelId,
    pub response_body: MessageBody,
}
