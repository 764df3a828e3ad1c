//! Inbound frame decoding
//!
//! Frames are JSON objects routed by their `type` field. Chat servers that
//! predate the envelope send bare `{"message", "sender"}` or `{"error"}`
//! objects; those are classified by the keys they carry. Any other untyped
//! object (for example an acknowledgement like `{"status": "received"}`) is
//! delivered as [`InboundMessage::Other`] with an empty kind.

use super::kinds;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while decoding an inbound frame
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame is not valid JSON
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    /// Frame is JSON but not an object
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// `type` field is present but not a string
    #[error("Message type must be a string")]
    InvalidKind,

    /// Binary frame that is not valid UTF-8
    #[error("Frame is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    /// Known message kind with missing or mistyped fields
    #[error("Invalid {kind} payload: {reason}")]
    InvalidPayload { kind: String, reason: String },
}

/// Author of a chat message
///
/// Rooms backed by authenticated users send an object, anonymous rooms a
/// plain display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Sender {
    User { username: String, id: i64 },
    Name(String),
}

impl Sender {
    /// Name to show next to the message
    #[must_use]
    pub fn display_name(&self) -> &str {
        match self {
            Self::User { username, .. } => username,
            Self::Name(name) => name,
        }
    }
}

impl Default for Sender {
    fn default() -> Self {
        Self::Name("Anonymous".to_string())
    }
}

impl std::fmt::Display for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

/// A message posted to the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub message: String,
    #[serde(default)]
    pub sender: Sender,
}

/// Membership change in the room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserEventKind {
    UserJoined,
    UserLeft,
    #[serde(other)]
    Unknown,
}

/// Join/leave notice broadcast to the room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEvent {
    pub message: String,
    pub event: UserEventKind,
}

/// Per-user notification pushed by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(default)]
    pub data: Value,
}

/// Error reported by the server about a frame we sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerError {
    pub error: String,
}

/// A decoded inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    ChatMessage(ChatMessage),
    UserEvent(UserEvent),
    Notification(Notification),
    ServerError(ServerError),
    /// Well-formed frame of a kind this client does not model
    Other { kind: String, payload: Value },
}

impl InboundMessage {
    /// Decode a text frame
    pub fn decode(frame: &str) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_str(frame).map_err(|e| DecodeError::InvalidJson(e.to_string()))?;

        let Value::Object(mut fields) = value else {
            return Err(DecodeError::NotAnObject);
        };

        let kind = match fields.remove("type") {
            Some(Value::String(kind)) => kind,
            Some(_) => return Err(DecodeError::InvalidKind),
            None => infer_kind(&fields).to_string(),
        };

        let payload = Value::Object(fields);
        match kind.as_str() {
            kinds::CHAT_MESSAGE => parse(&kind, payload).map(Self::ChatMessage),
            kinds::USER_EVENT => parse(&kind, payload).map(Self::UserEvent),
            kinds::NOTIFICATION => parse(&kind, payload).map(Self::Notification),
            kinds::ERROR => parse(&kind, payload).map(Self::ServerError),
            _ => Ok(Self::Other { kind, payload }),
        }
    }

    /// The discriminant this message was routed by
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::ChatMessage(_) => kinds::CHAT_MESSAGE,
            Self::UserEvent(_) => kinds::USER_EVENT,
            Self::Notification(_) => kinds::NOTIFICATION,
            Self::ServerError(_) => kinds::ERROR,
            Self::Other { kind, .. } => kind,
        }
    }
}

impl std::fmt::Display for InboundMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChatMessage(m) => write!(f, "[{}] {}", m.sender, m.message),
            Self::UserEvent(e) => write!(f, "* {}", e.message),
            Self::Notification(n) => write!(f, "notification: {}", n.data),
            Self::ServerError(e) => write!(f, "server error: {}", e.error),
            Self::Other { kind, payload } => write!(f, "{kind}: {payload}"),
        }
    }
}

/// Kind of an untyped frame; empty when the shape is not recognised
fn infer_kind(fields: &Map<String, Value>) -> &'static str {
    if fields.contains_key("error") {
        kinds::ERROR
    } else if fields.contains_key("message") {
        kinds::CHAT_MESSAGE
    } else {
        ""
    }
}

fn parse<T: serde::de::DeserializeOwned>(kind: &str, payload: Value) -> Result<T, DecodeError> {
    serde_json::from_value(payload).map_err(|e| DecodeError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}
