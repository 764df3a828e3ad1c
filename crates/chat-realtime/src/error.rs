//! Client error types

use crate::protocol::DecodeError;
use crate::transport::TransportError;
use thiserror::Error;

/// Errors reported by the connection manager
///
/// Every error either comes back as a rejected result or is handed to
/// [`ConnectionHandler::on_error`](crate::ConnectionHandler::on_error);
/// nothing here ever escapes as a panic.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// `send` was called while the connection was not open
    #[error("Not connected (state: {0})")]
    NotConnected(crate::ConnectionState),

    /// The manager has been shut down and accepts no further commands
    #[error("Connection manager closed")]
    Closed,

    /// Inbound frame could not be decoded
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Outbound payload could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// Transport-level failure (refused, dropped, errored)
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Reconnection attempts are exhausted
    #[error("Gave up after {0} reconnection attempts")]
    GaveUp(u32),
}

impl ClientError {
    /// Whether this error came from the underlying connection
    ///
    /// Transport failures are retried by the manager; decode failures and
    /// misuse are not.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Short machine-readable code for logs
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotConnected(_) => "NOT_CONNECTED",
            Self::Closed => "CLOSED",
            Self::Decode(_) => "DECODE_ERROR",
            Self::Encode(_) => "ENCODE_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::GaveUp(_) => "GAVE_UP",
        }
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Encode(err.to_string())
    }
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
