//! Outbound message envelope

use super::kinds;
use crate::error::{ClientError, ClientResult};
use serde::Serialize;
use serde_json::{Map, Value};

/// A payload plus its `type` envelope, ready to be framed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    kind: String,
    fields: Map<String, Value>,
}

impl OutboundMessage {
    /// Message of the given kind with no fields
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Chat message posted to the current room
    #[must_use]
    pub fn chat(message: impl Into<String>) -> Self {
        Self::new(kinds::CHAT_MESSAGE).with_field("message", message.into())
    }

    /// Wrap any serializable struct or map
    ///
    /// The payload must serialize to a JSON object (or unit); its fields are
    /// placed next to `type`.
    pub fn with_payload<T: Serialize>(kind: impl Into<String>, payload: &T) -> ClientResult<Self> {
        let fields = match serde_json::to_value(payload)? {
            Value::Object(fields) => fields,
            Value::Null => Map::new(),
            other => {
                return Err(ClientError::Encode(format!(
                    "payload must be an object, got {other}"
                )))
            }
        };

        Ok(Self {
            kind: kind.into(),
            fields,
        })
    }

    /// Add or replace a field
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Serialize to a single text frame
    ///
    /// The envelope `type` always wins over a payload field of the same name.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let mut object = self.fields.clone();
        object.insert("type".to_string(), Value::String(self.kind.clone()));
        serde_json::to_string(&Value::Object(object))
    }
}

impl std::fmt::Display for OutboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OutboundMessage(type={}, fields={})", self.kind, self.fields.len())
    }
}
