//! # chat-realtime
//!
//! Reconnecting WebSocket connection manager for chat rooms.
//!
//! A [`ConnectionManager`] owns one logical connection to a room endpoint.
//! It opens the transport, retries with capped exponential backoff when the
//! connection drops, decodes inbound frames and routes them to a
//! [`ConnectionHandler`]. [`ConnectionHandle::spawn`] runs a manager on its
//! own task and hands back a cloneable handle.

pub mod address;
pub mod backoff;
pub mod error;
pub mod handle;
pub mod handler;
pub mod manager;
pub mod protocol;
pub mod room;
pub mod scheduler;
pub mod state;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transport;

// Re-export commonly used types at crate root
pub use address::{chat_room_path, redact, resolve, room_url, with_token, AddressError};
pub use backoff::{Backoff, ReconnectConfig};
pub use error::{ClientError, ClientResult};
pub use handle::ConnectionHandle;
pub use handler::{Callbacks, ConnectionHandler};
pub use manager::ConnectionManager;
pub use protocol::{InboundMessage, OutboundMessage};
pub use room::{ChatRoom, RoomMessage};
pub use scheduler::{Scheduler, TokioScheduler};
pub use state::ConnectionState;
pub use transport::{Transport, TransportError, WebSocketTransport};
