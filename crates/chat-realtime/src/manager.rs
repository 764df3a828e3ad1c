//! Connection manager
//!
//! Owns one transport handle at a time and drives the lifecycle
//!
//! ```text
//! Idle -> Connecting -> Open -> ClosedPendingRetry -> Connecting -> ...
//!                   \-------------^          \-> GivenUp
//! ```
//!
//! The manager is a plain state machine: it performs no I/O and never
//! waits. Transport events and retry timers are queued on an internal
//! channel and applied one at a time by whoever owns the manager, either
//! [`ConnectionHandle`](crate::ConnectionHandle) in production or a test
//! calling [`ConnectionManager::process_pending`].

use crate::backoff::{Backoff, ReconnectConfig};
use crate::error::{ClientError, ClientResult};
use crate::handler::ConnectionHandler;
use crate::protocol::{DecodeError, InboundMessage, OutboundMessage};
use crate::scheduler::{Scheduler, TimerHandle, TimerId};
use crate::state::ConnectionState;
use crate::transport::{Generation, Transport, TransportEvent, TransportEvents};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

/// Events queued for the manager's owner
#[derive(Debug)]
pub(crate) enum DriverEvent {
    /// Something happened to the handle with this generation
    Transport {
        generation: Generation,
        event: TransportEvent,
    },
    /// A retry timer elapsed
    RetryTimer(TimerId),
}

/// Reconnecting connection manager for one endpoint
pub struct ConnectionManager<T, S, H> {
    /// Identifier used in log fields
    id: String,

    /// Resolved endpoint address
    address: String,

    /// Address without query or credentials, safe for logs
    log_address: String,

    transport: T,
    scheduler: S,
    handler: H,

    state: ConnectionState,
    backoff: Backoff,

    /// Generation of the live handle; bumped whenever a handle is retired
    generation: Generation,

    /// Retry timer waiting to fire, if any
    pending_timer: Option<TimerId>,
    next_timer_id: u64,

    state_tx: watch::Sender<ConnectionState>,
    events_tx: mpsc::UnboundedSender<DriverEvent>,
    events_rx: mpsc::UnboundedReceiver<DriverEvent>,
}

impl<T, S, H> ConnectionManager<T, S, H>
where
    T: Transport,
    S: Scheduler,
    H: ConnectionHandler,
{
    /// Create an idle manager; nothing happens until [`start`](Self::start)
    pub fn new(
        address: impl Into<String>,
        config: ReconnectConfig,
        transport: T,
        scheduler: S,
        handler: H,
    ) -> Self {
        let address = address.into();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, _) = watch::channel(ConnectionState::Idle);

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            log_address: crate::address::redact(&address),
            address,
            transport,
            scheduler,
            handler,
            state: ConnectionState::Idle,
            backoff: Backoff::new(config),
            generation: 0,
            pending_timer: None,
            next_timer_id: 0,
            state_tx,
            events_tx,
            events_rx,
        }
    }

    // === Accessors ===

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Address with the query string stripped, for display and logs
    #[must_use]
    pub fn log_address(&self) -> &str {
        &self.log_address
    }

    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    #[must_use]
    pub fn is_connecting(&self) -> bool {
        self.state.is_connecting()
    }

    /// Retries consumed since the last successful open
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.backoff.attempts()
    }

    /// Delay the next retry would use
    #[must_use]
    pub fn current_backoff(&self) -> Duration {
        self.backoff.current_interval()
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[must_use]
    pub fn has_pending_retry(&self) -> bool {
        self.pending_timer.is_some()
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// Receiver that observes every state change
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    // === Caller operations ===

    /// Begin connecting
    ///
    /// No-op while a handle is open, an attempt is in flight, a retry is
    /// pending, or the manager has given up.
    pub fn start(&mut self) {
        if self.state != ConnectionState::Idle {
            tracing::debug!(id = %self.id, state = %self.state, "start ignored");
            return;
        }
        self.connect();
    }

    /// Serialize and transmit immediately
    ///
    /// Rejected unless the state is `Open`; rejections are also reported
    /// to [`ConnectionHandler::on_error`]. Nothing is queued.
    pub fn send(&mut self, message: &OutboundMessage) -> ClientResult<()> {
        let result = self.try_send(message);
        if let Err(e) = &result {
            tracing::warn!(id = %self.id, kind = message.kind(), error = %e, "Send rejected");
            self.handler.on_error(e);
        }
        result
    }

    fn try_send(&mut self, message: &OutboundMessage) -> ClientResult<()> {
        if self.state != ConnectionState::Open {
            return Err(ClientError::NotConnected(self.state));
        }

        let frame = message.to_frame()?;
        self.transport.send(frame)?;

        tracing::trace!(id = %self.id, kind = message.kind(), "Frame sent");
        Ok(())
    }

    /// Tear everything down and return to `Idle`
    ///
    /// Cancels the retry timer and closes the transport; events from the
    /// closed handle are ignored. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Idle && self.pending_timer.is_none() {
            return;
        }

        self.cancel_retry();
        self.retire_handle();
        self.backoff.reset();
        self.set_state(ConnectionState::Idle);

        tracing::info!(id = %self.id, address = %self.log_address, "Connection closed by caller");
    }

    /// Drop the current handle and connect again with a fresh retry budget
    pub fn force_reconnect(&mut self) {
        tracing::info!(id = %self.id, state = %self.state, "Forcing reconnect");

        self.cancel_retry();
        self.retire_handle();
        self.backoff.reset();
        self.connect();
    }

    // === Event processing ===

    /// Apply every event queued so far; returns how many were applied
    pub fn process_pending(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Wait for the next queued event
    pub(crate) async fn next_event(&mut self) -> Option<DriverEvent> {
        self.events_rx.recv().await
    }

    pub(crate) fn handle_event(&mut self, event: DriverEvent) {
        match event {
            DriverEvent::Transport { generation, event } => {
                if generation != self.generation || !self.has_live_handle() {
                    tracing::trace!(
                        id = %self.id,
                        generation,
                        current = self.generation,
                        "Ignoring event from stale handle"
                    );
                    return;
                }
                self.on_transport_event(event);
            }
            DriverEvent::RetryTimer(timer) => {
                if self.pending_timer != Some(timer) {
                    tracing::trace!(id = %self.id, %timer, "Ignoring stale retry timer");
                    return;
                }
                self.pending_timer = None;
                if self.state == ConnectionState::ClosedPendingRetry {
                    self.connect();
                }
            }
        }
    }

    fn on_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => {
                if self.state != ConnectionState::Connecting {
                    return;
                }
                self.backoff.reset();
                self.set_state(ConnectionState::Open);
                tracing::info!(id = %self.id, address = %self.log_address, "Connected");
                self.handler.on_connect();
            }
            TransportEvent::Frame(text) => {
                if self.state != ConnectionState::Open {
                    tracing::debug!(id = %self.id, state = %self.state, "Frame before open dropped");
                    return;
                }
                match InboundMessage::decode(&text) {
                    Ok(message) => {
                        tracing::trace!(id = %self.id, kind = message.kind(), "Frame received");
                        self.handler.on_message(message);
                    }
                    Err(e) => {
                        tracing::warn!(id = %self.id, error = %e, "Dropping malformed frame");
                        self.handler.on_error(&ClientError::Decode(e));
                    }
                }
            }
            TransportEvent::Malformed(reason) => {
                if self.state != ConnectionState::Open {
                    return;
                }
                tracing::warn!(id = %self.id, reason = %reason, "Dropping unreadable frame");
                self.handler
                    .on_error(&ClientError::Decode(DecodeError::InvalidEncoding(reason)));
            }
            TransportEvent::Closed(info) => {
                let was_open = self.state == ConnectionState::Open;
                tracing::info!(id = %self.id, close = %info, was_open, "Connection closed");

                self.retire_handle();
                if was_open {
                    self.handler.on_disconnect();
                }
                self.schedule_retry();
            }
            TransportEvent::Errored(error) => {
                let was_open = self.state == ConnectionState::Open;
                tracing::warn!(id = %self.id, error = %error, was_open, "Connection failed");

                self.retire_handle();
                self.handler.on_error(&ClientError::Transport(error));
                if was_open {
                    self.handler.on_disconnect();
                }
                self.schedule_retry();
            }
        }
    }

    // === Internals ===

    fn has_live_handle(&self) -> bool {
        matches!(self.state, ConnectionState::Connecting | ConnectionState::Open)
    }

    /// Create a new handle under a fresh generation
    fn connect(&mut self) {
        self.generation += 1;
        self.set_state(ConnectionState::Connecting);

        tracing::debug!(
            id = %self.id,
            address = %self.log_address,
            generation = self.generation,
            attempt = self.backoff.attempts(),
            "Opening transport"
        );

        let events = TransportEvents::new(self.generation, self.events_tx.clone());
        self.transport.open(&self.address, events);
    }

    /// Close the live handle and make its later events stale
    fn retire_handle(&mut self) {
        if self.has_live_handle() {
            self.transport.close();
        }
        self.generation += 1;
    }

    fn schedule_retry(&mut self) {
        let Some(delay) = self.backoff.next_delay() else {
            self.set_state(ConnectionState::GivenUp);
            let attempts = self.backoff.attempts();
            tracing::error!(
                id = %self.id,
                address = %self.log_address,
                attempts,
                "Giving up on reconnection"
            );
            self.handler.on_give_up(attempts);
            return;
        };

        self.next_timer_id += 1;
        let timer = TimerId(self.next_timer_id);
        self.pending_timer = Some(timer);
        self.set_state(ConnectionState::ClosedPendingRetry);

        tracing::info!(
            id = %self.id,
            attempt = self.backoff.attempts(),
            max_attempts = self.backoff.config().max_attempts,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Scheduling reconnect"
        );

        self.scheduler
            .schedule(delay, TimerHandle::new(timer, self.events_tx.clone()));
    }

    fn cancel_retry(&mut self) {
        if let Some(timer) = self.pending_timer.take() {
            self.scheduler.cancel(timer);
        }
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state == state {
            return;
        }
        tracing::debug!(id = %self.id, from = %self.state, to = %state, "State transition");
        self.state = state;
        self.state_tx.send_replace(state);
    }
}

impl<T, S, H> std::fmt::Debug for ConnectionManager<T, S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("id", &self.id)
            .field("address", &self.log_address)
            .field("state", &self.state)
            .field("attempts", &self.backoff.attempts())
            .field("generation", &self.generation)
            .finish()
    }
}
