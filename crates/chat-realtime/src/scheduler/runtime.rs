//! Scheduler on the tokio timer wheel

use super::{Scheduler, TimerHandle, TimerId};
use std::collections::HashMap;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Fires timers from spawned `tokio::time::sleep` tasks
#[derive(Debug, Default)]
pub struct TokioScheduler {
    timers: HashMap<TimerId, JoinHandle<()>>,
}

impl TokioScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Timers scheduled and not yet fired or cancelled
    #[must_use]
    pub fn pending(&self) -> usize {
        self.timers.values().filter(|task| !task.is_finished()).count()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&mut self, delay: Duration, timer: TimerHandle) {
        self.timers.retain(|_, task| !task.is_finished());

        let id = timer.id();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            timer.fire();
        });
        self.timers.insert(id, task);
    }

    fn cancel(&mut self, id: TimerId) {
        if let Some(task) = self.timers.remove(&id) {
            task.abort();
        }
    }
}

impl Drop for TokioScheduler {
    fn drop(&mut self) {
        for (_, task) in self.timers.drain() {
            task.abort();
        }
    }
}
