//! Wire protocol
//!
//! Every message is one text frame holding a JSON object with a `type`
//! discriminant.

mod inbound;
mod outbound;

pub use inbound::{
    ChatMessage, DecodeError, InboundMessage, Notification, Sender, ServerError, UserEvent,
    UserEventKind,
};
pub use outbound::OutboundMessage;

/// Message kinds understood by this client
pub mod kinds {
    pub const CHAT_MESSAGE: &str = "chat_message";
    pub const USER_EVENT: &str = "user_event";
    pub const NOTIFICATION: &str = "notification";
    pub const ERROR: &str = "error";
}
