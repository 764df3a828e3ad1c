//! Caller-facing handle
//!
//! [`ConnectionHandle::spawn`] moves a [`ConnectionManager`] into a single
//! driver task. The task is the only place manager state is mutated: caller
//! commands, transport events and retry timers are all serialized through
//! it. The handle only sends commands and reads the published state.

use crate::error::{ClientError, ClientResult};
use crate::handler::ConnectionHandler;
use crate::manager::ConnectionManager;
use crate::protocol::OutboundMessage;
use crate::scheduler::Scheduler;
use crate::state::ConnectionState;
use crate::transport::Transport;
use tokio::sync::{mpsc, oneshot, watch};

/// Commands sent from the handle to the driver task
#[derive(Debug)]
enum Command {
    Send {
        message: OutboundMessage,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    ForceReconnect,
    Close {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running connection manager
///
/// Cloning is cheap. When the last clone is dropped the driver closes the
/// connection and exits.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
}

impl ConnectionHandle {
    /// Start the manager on a new driver task
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn<T, S, H>(manager: ConnectionManager<T, S, H>) -> Self
    where
        T: Transport,
        S: Scheduler,
        H: ConnectionHandler,
    {
        let (commands, rx) = mpsc::unbounded_channel();
        let state = manager.subscribe();

        tokio::spawn(drive(manager, rx));

        Self { commands, state }
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.state().is_connecting()
    }

    /// Receiver for awaiting state changes
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(ConnectionState) -> bool,
    ) -> ClientResult<ConnectionState> {
        let mut state = self.state.clone();
        let result = state
            .wait_for(|s| predicate(*s))
            .await
            .map(|s| *s)
            .map_err(|_| ClientError::Closed);
        result
    }

    /// Transmit a message if the connection is open
    ///
    /// Fails with [`ClientError::NotConnected`] otherwise; the message is
    /// never queued.
    pub async fn send(&self, message: OutboundMessage) -> ClientResult<()> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(Command::Send { message, reply })
            .map_err(|_| ClientError::Closed)?;
        rx.await.map_err(|_| ClientError::Closed)?
    }

    /// Drop the current connection and reconnect with a fresh retry budget
    pub fn force_reconnect(&self) -> ClientResult<()> {
        self.commands
            .send(Command::ForceReconnect)
            .map_err(|_| ClientError::Closed)
    }

    /// Close the connection and stop the driver
    ///
    /// Returns once the manager is `Idle`. Calling it again is a no-op.
    pub async fn close(&self) {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Close { reply }).is_ok() {
            let _ = rx.await;
        }
    }

    /// Whether the driver task has stopped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Driver loop owning the manager
async fn drive<T, S, H>(
    mut manager: ConnectionManager<T, S, H>,
    mut commands: mpsc::UnboundedReceiver<Command>,
) where
    T: Transport,
    S: Scheduler,
    H: ConnectionHandler,
{
    tracing::debug!(id = %manager.id(), address = %manager.log_address(), "Driver started");
    manager.start();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send { message, reply }) => {
                    let _ = reply.send(manager.send(&message));
                }
                Some(Command::ForceReconnect) => manager.force_reconnect(),
                Some(Command::Close { reply }) => {
                    manager.close();
                    let _ = reply.send(());
                    break;
                }
                None => {
                    tracing::debug!(id = %manager.id(), "All handles dropped");
                    manager.close();
                    break;
                }
            },
            Some(event) = manager.next_event() => manager.handle_event(event),
        }
    }

    tracing::debug!(id = %manager.id(), "Driver stopped");
}
