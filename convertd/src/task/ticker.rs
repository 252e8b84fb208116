//! Periodic queue check.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::TaskService;

/// Signals both queues every `period` so rows admitted while the worker was
/// busy, or left over from a previous run, get picked up eventually.
pub struct QueueTicker {
    tasks: Arc<TaskService>,
    period: Duration,
}

impl QueueTicker {
    pub fn new(tasks: Arc<TaskService>, period: Duration) -> Self {
        Self { tasks, period }
    }

    pub async fn run(&self, token: CancellationToken) {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately; consume
        // it so the first signal lands one full period after startup.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("queue ticker stopped");
                    return;
                }
                _ = interval.tick() => {
                    debug!("periodic queue check");
                    self.tasks.try_queue_conversion();
                    self.tasks.try_queue_deletion();
                }
            }
        }
    }
}
