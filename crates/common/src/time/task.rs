//! Recurring tasks with cooperative cancellation

use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A spawned task that runs a callback on a fixed period
///
/// The first run happens one full period after start. The callback can end
/// the task by returning `ControlFlow::Break`. Dropping the handle cancels
/// the task, so a timer never outlives the component that owns it.
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    /// Spawn `tick` every `period` on the current tokio runtime
    pub fn every<F, Fut>(name: &'static str, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    () = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if tick().await.is_break() {
                            debug!(task = name, "scheduled task finished");
                            break;
                        }
                    }
                }
            }
        });

        debug!(task = name, period_ms = period.as_millis() as u64, "scheduled task started");
        Self { name, cancel, handle }
    }

    /// Task name used in logs
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Request the task to stop after its current tick
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!(task = self.name, "scheduled task stopped");
            self.cancel.cancel();
        }
    }

    /// Whether the task is still scheduled
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
