//! Retry timer scheduling
//!
//! The manager never sleeps itself. It asks a [`Scheduler`] to fire a
//! [`TimerHandle`] after a delay; the fired timer arrives as an event on the
//! manager's queue, ordered with transport events.

mod runtime;

pub use runtime::TokioScheduler;

use crate::manager::DriverEvent;
use std::time::Duration;
use tokio::sync::mpsc;

/// Identifier of a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

/// A timer waiting to fire
#[derive(Debug)]
pub struct TimerHandle {
    id: TimerId,
    tx: mpsc::UnboundedSender<DriverEvent>,
}

impl TimerHandle {
    pub(crate) fn new(id: TimerId, tx: mpsc::UnboundedSender<DriverEvent>) -> Self {
        Self { id, tx }
    }

    #[must_use]
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Deliver the timer to the manager
    pub fn fire(self) {
        let _ = self.tx.send(DriverEvent::RetryTimer(self.id));
    }
}

/// Deferred execution capability
pub trait Scheduler: Send + 'static {
    /// Fire `timer` once `delay` has elapsed
    fn schedule(&mut self, delay: Duration, timer: TimerHandle);

    /// Drop a timer that has not fired yet; unknown ids are ignored
    fn cancel(&mut self, id: TimerId);
}
