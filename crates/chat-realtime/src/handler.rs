//! Caller callbacks
//!
//! The manager holds exactly one [`ConnectionHandler`] and invokes it from
//! its owner task. Every method has a no-op default, so callers implement
//! only what they care about.

use crate::error::ClientError;
use crate::protocol::{ChatMessage, InboundMessage, Notification, ServerError, UserEvent};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;

/// Lifecycle and message callbacks
pub trait ConnectionHandler: Send + 'static {
    /// A decoded inbound message
    ///
    /// The default routes on the message kind to the typed callbacks below.
    fn on_message(&mut self, message: InboundMessage) {
        match message {
            InboundMessage::ChatMessage(m) => self.on_chat_message(m),
            InboundMessage::UserEvent(e) => self.on_user_event(e),
            InboundMessage::Notification(n) => self.on_notification(n),
            InboundMessage::ServerError(e) => self.on_server_error(e),
            InboundMessage::Other { kind, payload } => self.on_other(&kind, payload),
        }
    }

    fn on_chat_message(&mut self, _message: ChatMessage) {}

    fn on_user_event(&mut self, _event: UserEvent) {}

    fn on_notification(&mut self, _notification: Notification) {}

    fn on_server_error(&mut self, _error: ServerError) {}

    fn on_other(&mut self, _kind: &str, _payload: Value) {}

    /// The transport opened
    fn on_connect(&mut self) {}

    /// An open transport closed or failed
    fn on_disconnect(&mut self) {}

    /// Transport failure, decode failure, or rejected send
    fn on_error(&mut self, _error: &ClientError) {}

    /// Retries are exhausted and the manager is now `GivenUp`
    fn on_give_up(&mut self, attempts: u32) {
        self.on_error(&ClientError::GaveUp(attempts));
    }
}

impl ConnectionHandler for () {}

impl<H: ConnectionHandler + ?Sized> ConnectionHandler for Box<H> {
    fn on_message(&mut self, message: InboundMessage) {
        (**self).on_message(message);
    }

    fn on_connect(&mut self) {
        (**self).on_connect();
    }

    fn on_disconnect(&mut self) {
        (**self).on_disconnect();
    }

    fn on_error(&mut self, error: &ClientError) {
        (**self).on_error(error);
    }

    fn on_give_up(&mut self, attempts: u32) {
        (**self).on_give_up(attempts);
    }
}

/// Shared handler, readable by the caller while the manager owns a clone
impl<H: ConnectionHandler> ConnectionHandler for Arc<Mutex<H>> {
    fn on_message(&mut self, message: InboundMessage) {
        self.lock().on_message(message);
    }

    fn on_connect(&mut self) {
        self.lock().on_connect();
    }

    fn on_disconnect(&mut self) {
        self.lock().on_disconnect();
    }

    fn on_error(&mut self, error: &ClientError) {
        self.lock().on_error(error);
    }

    fn on_give_up(&mut self, attempts: u32) {
        self.lock().on_give_up(attempts);
    }
}

type MessageFn = Box<dyn FnMut(InboundMessage) + Send>;
type EventFn = Box<dyn FnMut() + Send>;
type ErrorFn = Box<dyn FnMut(&ClientError) + Send>;

/// Closure-based handler where every callback is optional
///
/// Built with the `with_*` methods so the names never shadow the
/// [`ConnectionHandler`] callbacks.
#[derive(Default)]
pub struct Callbacks {
    on_message: Option<MessageFn>,
    on_connect: Option<EventFn>,
    on_disconnect: Option<EventFn>,
    on_error: Option<ErrorFn>,
}

impl Callbacks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_on_message(mut self, f: impl FnMut(InboundMessage) + Send + 'static) -> Self {
        self.on_message = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_connect(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_connect = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_disconnect(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_disconnect = Some(Box::new(f));
        self
    }

    #[must_use]
    pub fn with_on_error(mut self, f: impl FnMut(&ClientError) + Send + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl ConnectionHandler for Callbacks {
    fn on_message(&mut self, message: InboundMessage) {
        if let Some(f) = self.on_message.as_mut() {
            f(message);
        }
    }

    fn on_connect(&mut self) {
        if let Some(f) = self.on_connect.as_mut() {
            f();
        }
    }

    fn on_disconnect(&mut self) {
        if let Some(f) = self.on_disconnect.as_mut() {
            f();
        }
    }

    fn on_error(&mut self, error: &ClientError) {
        if let Some(f) = self.on_error.as_mut() {
            f(error);
        }
    }
}

impl std::fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Callbacks")
            .field("on_message", &self.on_message.is_some())
            .field("on_connect", &self.on_connect.is_some())
            .field("on_disconnect", &self.on_disconnect.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
