//! Chat room model
//!
//! [`ChatRoom`] is a ready-made handler holding what a chat panel shows:
//! the message log, a short-lived notification line and connection status.

use crate::error::ClientError;
use crate::handler::ConnectionHandler;
use crate::protocol::{ChatMessage, Notification, ServerError, Sender, UserEvent};
use chrono::{DateTime, Local};
use serde_json::Value;
use std::time::{Duration, Instant};

/// How long a notification stays visible
pub const NOTIFICATION_TTL: Duration = Duration::from_secs(3);

/// One line of the message log
#[derive(Debug, Clone, PartialEq)]
pub struct RoomMessage {
    pub sender: Sender,
    pub message: String,
    /// Local time of receipt
    pub received_at: DateTime<Local>,
}

impl std::fmt::Display for RoomMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} [{}] {}",
            self.received_at.format("%H:%M:%S"),
            self.sender,
            self.message
        )
    }
}

#[derive(Debug, Clone)]
struct TransientNotice {
    text: String,
    shown_at: Instant,
}

/// Chat panel state fed by connection callbacks
#[derive(Debug, Default)]
pub struct ChatRoom {
    messages: Vec<RoomMessage>,
    notice: Option<TransientNotice>,
    connected: bool,
    gave_up: bool,
    last_error: Option<String>,
}

impl ChatRoom {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[RoomMessage] {
        &self.messages
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Whether the connection stopped retrying
    pub fn gave_up(&self) -> bool {
        self.gave_up
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Current notification, if still within [`NOTIFICATION_TTL`]
    pub fn notification(&self) -> Option<&str> {
        self.notification_at(Instant::now())
    }

    pub fn notification_at(&self, now: Instant) -> Option<&str> {
        self.notice
            .as_ref()
            .filter(|n| now.saturating_duration_since(n.shown_at) < NOTIFICATION_TTL)
            .map(|n| n.text.as_str())
    }

    /// Replace the current notification
    pub fn notify(&mut self, text: impl Into<String>) {
        self.notice = Some(TransientNotice {
            text: text.into(),
            shown_at: Instant::now(),
        });
    }
}

impl ConnectionHandler for ChatRoom {
    fn on_chat_message(&mut self, message: ChatMessage) {
        self.messages.push(RoomMessage {
            sender: message.sender,
            message: message.message,
            received_at: Local::now(),
        });
    }

    fn on_user_event(&mut self, event: UserEvent) {
        self.notify(event.message);
    }

    fn on_notification(&mut self, notification: Notification) {
        match notification.data {
            Value::String(text) => self.notify(text),
            Value::Null => {}
            other => self.notify(other.to_string()),
        }
    }

    fn on_server_error(&mut self, error: ServerError) {
        tracing::warn!(error = %error.error, "Server reported an error");
        self.last_error = Some(error.error);
    }

    fn on_connect(&mut self) {
        self.connected = true;
        self.gave_up = false;
        self.last_error = None;
    }

    fn on_disconnect(&mut self) {
        self.connected = false;
    }

    fn on_error(&mut self, error: &ClientError) {
        if error.is_transport() {
            self.connected = false;
        }
        self.last_error = Some(error.to_string());
    }

    fn on_give_up(&mut self, attempts: u32) {
        self.connected = false;
        self.gave_up = true;
        self.last_error = Some(ClientError::GaveUp(attempts).to_string());
    }
}
