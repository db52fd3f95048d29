//! # Message Bodies
//!
//! Text travels on the wire; callers see a [`MessageBody`] that records
//! whether the text decoded as JSON.

use serde::Serialize;
use serde_json::Value;

/// A message body that either decoded as JSON or was kept as raw text.
///
/// Serializes untagged: a structured body as its JSON value, a raw body as a
/// JSON string.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageBody {
    /// The text was valid JSON.
    Structured(Value),
    /// The text was not valid JSON and is passed through unchanged.
    Raw(String),
}

impl MessageBody {
    /// Decode wire text, falling back to [`MessageBody::Raw`]. Never fails.
    #[must_use]
    pub fn decode(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => Self::Structured(value),
            Err(_) => Self::Raw(text.to_string()),
        }
    }

    /// Encode to wire text. Structured bodies are written as compact JSON.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Structured(value) => value.to_string(),
            Self::Raw(text) => text.clone(),
        }
    }

    /// Whether the body decoded as JSON.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        matches!(self, Self::Structured(_))
    }

    /// Get the JSON value, if structured.
    #[must_use]
    pub fn as_structured(&self) -> Option<&Value> {
        match self {
            Self::Structured(value) => Some(value),
            Self::Raw(_) => None,
        }
    }

    /// Convert into a JSON value; raw text becomes a JSON string.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Structured(value) => value,
            Self::Raw(text) => Value::String(text),
        }
    }
}

impl From<Value> for MessageBody {
    fn from(value: Value) -> Self {
        Self::Structured(value)
    }
}

impl From<String> for MessageBody {
    fn from(text: String) -> Self {
        Self::Raw(text)
    }
}

impl From<&str> for MessageBody {
    fn from(text: &str) -> Self {
        Self::Raw(text.to_string())
    }
}
