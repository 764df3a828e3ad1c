//! Transport abstraction
//!
//! A transport owns at most one persistent, message-oriented connection.
//! It never calls back into the manager directly: every lifecycle change is
//! reported through the [`TransportEvents`] sink it received in
//! [`Transport::open`], tagged with the generation of that handle.

mod websocket;

pub use websocket::WebSocketTransport;

use crate::manager::DriverEvent;
use thiserror::Error;
use tokio::sync::mpsc;

/// Monotonic tag distinguishing successive transport handles
pub type Generation = u64;

/// Normal closure close code
pub const CLOSE_NORMAL: u16 = 1000;

/// Endpoint going away close code
pub const CLOSE_GOING_AWAY: u16 = 1001;

/// Transport errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection could not be established
    #[error("Connection failed: {0}")]
    Connect(String),

    /// No open connection to write to
    #[error("Transport is not open")]
    NotOpen,

    /// Writing a frame failed
    #[error("Send failed: {0}")]
    Send(String),

    /// The connection failed after it was established
    #[error("Connection error: {0}")]
    Protocol(String),
}

/// Close details reported with [`TransportEvent::Closed`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseInfo {
    /// Close code, `None` when the peer vanished without a close frame
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// Close without a close frame
    #[must_use]
    pub fn abnormal() -> Self {
        Self::default()
    }

    /// Whether the peer closed the connection deliberately
    #[must_use]
    pub fn is_normal(&self) -> bool {
        matches!(self.code, Some(CLOSE_NORMAL | CLOSE_GOING_AWAY))
    }
}

impl std::fmt::Display for CloseInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.code {
            Some(code) if self.reason.is_empty() => write!(f, "{code}"),
            Some(code) => write!(f, "{code} ({})", self.reason),
            None => f.write_str("no close frame"),
        }
    }
}

/// Something that happened to a transport handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    /// A frame arrived that cannot be read as text; the handle stays up
    Malformed(String),
    Closed(CloseInfo),
    Errored(TransportError),
}

/// Event sink handed to a transport for one handle
#[derive(Debug, Clone)]
pub struct TransportEvents {
    generation: Generation,
    tx: mpsc::UnboundedSender<DriverEvent>,
}

impl TransportEvents {
    pub(crate) fn new(generation: Generation, tx: mpsc::UnboundedSender<DriverEvent>) -> Self {
        Self { generation, tx }
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Report an event; returns `false` once the manager is gone
    pub fn emit(&self, event: TransportEvent) -> bool {
        self.tx
            .send(DriverEvent::Transport {
                generation: self.generation,
                event,
            })
            .is_ok()
    }

    pub fn opened(&self) -> bool {
        self.emit(TransportEvent::Opened)
    }

    pub fn frame(&self, text: impl Into<String>) -> bool {
        self.emit(TransportEvent::Frame(text.into()))
    }

    pub fn malformed(&self, reason: impl Into<String>) -> bool {
        self.emit(TransportEvent::Malformed(reason.into()))
    }

    pub fn closed(&self, info: CloseInfo) -> bool {
        self.emit(TransportEvent::Closed(info))
    }

    pub fn errored(&self, error: TransportError) -> bool {
        self.emit(TransportEvent::Errored(error))
    }
}

/// A persistent bidirectional connection
///
/// Implementations must not block: `open` starts the connection attempt
/// and returns immediately, reporting progress through `events`.
pub trait Transport: Send + 'static {
    /// Begin connecting to `address`, replacing any previous handle
    fn open(&mut self, address: &str, events: TransportEvents);

    /// Write one text frame on the current handle
    fn send(&mut self, frame: String) -> Result<(), TransportError>;

    /// Close the current handle, if any
    fn close(&mut self);
}
