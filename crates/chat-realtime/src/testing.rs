//! Deterministic test doubles
//!
//! [`MemoryTransport`] and [`ManualScheduler`] are cheap to clone: the
//! manager owns one clone while the test keeps another to drive events and
//! inspect what happened. Nothing here touches the network or the clock.

use crate::error::ClientError;
use crate::handler::ConnectionHandler;
use crate::protocol::InboundMessage;
use crate::scheduler::{Scheduler, TimerHandle, TimerId};
use crate::transport::{CloseInfo, Transport, TransportError, TransportEvents, CLOSE_NORMAL};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

// === Transport ===

#[derive(Debug, Default)]
struct MemoryTransportInner {
    /// Event sink of every handle ever opened, oldest first
    handles: Vec<TransportEvents>,
    addresses: Vec<String>,
    sent: Vec<String>,
    closes: usize,
    open: bool,
}

/// In-memory transport driven by the test
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    inner: Arc<Mutex<MemoryTransportInner>>,
}

impl MemoryTransport {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles opened so far
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.inner.lock().handles.len()
    }

    #[must_use]
    pub fn close_count(&self) -> usize {
        self.inner.lock().closes
    }

    /// Addresses passed to `open`, in order
    #[must_use]
    pub fn addresses(&self) -> Vec<String> {
        self.inner.lock().addresses.clone()
    }

    /// Frames written through `send`, in order
    #[must_use]
    pub fn sent_frames(&self) -> Vec<String> {
        self.inner.lock().sent.clone()
    }

    /// Event sink of the `index`-th handle, for replaying stale events
    ///
    /// # Panics
    /// Panics if fewer than `index + 1` handles were opened.
    #[must_use]
    pub fn handle(&self, index: usize) -> TransportEvents {
        self.inner.lock().handles[index].clone()
    }

    /// Sink of the newest handle; the `emit_*` helpers panic before any `open`
    fn latest(&self) -> TransportEvents {
        self.inner
            .lock()
            .handles
            .last()
            .cloned()
            .expect("no transport handle has been opened")
    }

    pub fn emit_opened(&self) {
        self.latest().opened();
    }

    pub fn emit_frame(&self, text: &str) {
        self.latest().frame(text);
    }

    /// Frame that could not be read as text
    pub fn emit_malformed(&self, reason: &str) {
        self.latest().malformed(reason);
    }

    /// Peer closes normally
    pub fn emit_closed(&self) {
        self.latest().closed(CloseInfo::new(CLOSE_NORMAL, ""));
    }

    pub fn emit_error(&self, reason: &str) {
        self.latest()
            .errored(TransportError::Connect(reason.to_string()));
    }
}

impl Transport for MemoryTransport {
    fn open(&mut self, address: &str, events: TransportEvents) {
        let mut inner = self.inner.lock();
        inner.addresses.push(address.to_string());
        inner.handles.push(events);
        inner.open = true;
    }

    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        let mut inner = self.inner.lock();
        if !inner.open {
            return Err(TransportError::NotOpen);
        }
        inner.sent.push(frame);
        Ok(())
    }

    fn close(&mut self) {
        let mut inner = self.inner.lock();
        inner.closes += 1;
        inner.open = false;
    }
}

// === Scheduler ===

#[derive(Debug)]
struct PendingTimer {
    deadline: Duration,
    delay: Duration,
    timer: TimerHandle,
}

#[derive(Debug, Default)]
struct ManualSchedulerInner {
    now: Duration,
    pending: Vec<PendingTimer>,
    scheduled: Vec<Duration>,
}

/// Virtual-time scheduler; timers fire only when the test advances time
#[derive(Debug, Clone, Default)]
pub struct ManualScheduler {
    inner: Arc<Mutex<ManualSchedulerInner>>,
}

impl ManualScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.lock().now
    }

    /// Timers scheduled and not yet fired or cancelled
    #[must_use]
    pub fn pending(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Every delay ever requested, in order
    #[must_use]
    pub fn scheduled_delays(&self) -> Vec<Duration> {
        self.inner.lock().scheduled.clone()
    }

    /// Move time forward and fire every timer that is due; returns how many fired
    pub fn advance(&self, by: Duration) -> usize {
        let mut inner = self.inner.lock();
        inner.now += by;
        let now = inner.now;

        let (mut due, rest): (Vec<_>, Vec<_>) =
            inner.pending.drain(..).partition(|p| p.deadline <= now);
        inner.pending = rest;
        due.sort_by_key(|p| (p.deadline, p.timer.id()));

        let fired = due.len();
        for pending in due {
            pending.timer.fire();
        }
        fired
    }

    /// Jump to the earliest pending timer and fire it, returning its delay
    pub fn fire_next(&self) -> Option<Duration> {
        let mut inner = self.inner.lock();
        let index = inner
            .pending
            .iter()
            .enumerate()
            .min_by_key(|(_, p)| (p.deadline, p.timer.id()))
            .map(|(i, _)| i)?;

        let pending = inner.pending.remove(index);
        inner.now = inner.now.max(pending.deadline);
        pending.timer.fire();
        Some(pending.delay)
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&mut self, delay: Duration, timer: TimerHandle) {
        let mut inner = self.inner.lock();
        let deadline = inner.now + delay;
        inner.scheduled.push(delay);
        inner.pending.push(PendingTimer {
            deadline,
            delay,
            timer,
        });
    }

    fn cancel(&mut self, id: TimerId) {
        self.inner.lock().pending.retain(|p| p.timer.id() != id);
    }
}

// === Handler ===

/// One recorded callback invocation
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerCall {
    Message(InboundMessage),
    Connect,
    Disconnect,
    /// Error code, see [`ClientError::code`]
    Error(&'static str),
    GiveUp(u32),
}

/// Handler that records every callback in order
#[derive(Debug, Default)]
pub struct RecordingHandler {
    calls: Vec<HandlerCall>,
}

impl RecordingHandler {
    #[must_use]
    pub fn calls(&self) -> &[HandlerCall] {
        &self.calls
    }

    /// Decoded messages only
    #[must_use]
    pub fn messages(&self) -> Vec<InboundMessage> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                HandlerCall::Message(m) => Some(m.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn count(&self, call: &HandlerCall) -> usize {
        self.calls.iter().filter(|c| *c == call).count()
    }
}

impl ConnectionHandler for RecordingHandler {
    fn on_message(&mut self, message: InboundMessage) {
        self.calls.push(HandlerCall::Message(message));
    }

    fn on_connect(&mut self) {
        self.calls.push(HandlerCall::Connect);
    }

    fn on_disconnect(&mut self) {
        self.calls.push(HandlerCall::Disconnect);
    }

    fn on_error(&mut self, error: &ClientError) {
        self.calls.push(HandlerCall::Error(error.code()));
    }

    fn on_give_up(&mut self, attempts: u32) {
        self.calls.push(HandlerCall::GiveUp(attempts));
    }
}
