//! Idle monitor
//!
//! Counts down from the last activity signal. The countdown enters the
//! warning phase inside the configured window and expires at zero; what
//! happens on expiry (logout) is decided by the session manager.

use std::ops::ControlFlow;
use std::sync::{Arc, Weak};
use std::time::Duration;

use authlab_common::time::{Clock, ScheduledTask};
use authlab_domain::constants::IDLE_TICK_MS;
use authlab_domain::{IdleConfig, IdlePhase, IdleState};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, info};

struct IdleInner {
    config: IdleConfig,
    clock: Arc<dyn Clock>,
    state: watch::Sender<IdleState>,
    task: Mutex<Option<ScheduledTask>>,
}

impl IdleInner {
    fn tick(&self) -> ControlFlow<()> {
        let now = self.clock.now_millis();
        let timeout = self.config.timeout_secs;
        let warning = self.config.warning_secs;

        let mut stopped = false;
        let mut expired = false;
        self.state.send_if_modified(|state| {
            if state.phase == IdlePhase::Disabled {
                stopped = true;
                return false;
            }
            let elapsed_secs = u64::try_from((now - state.last_activity_ms).max(0) / 1000).unwrap_or(0);
            let remaining = timeout.saturating_sub(elapsed_secs);
            let phase = IdleState::phase_for(remaining, warning);
            expired = phase == IdlePhase::Expired;
            if phase != state.phase {
                debug!(from = %state.phase, to = %phase, remaining, "idle phase changed");
            }
            let changed = phase != state.phase || remaining != state.remaining_secs;
            state.phase = phase;
            state.remaining_secs = remaining;
            changed
        });

        if stopped {
            ControlFlow::Break(())
        } else if expired {
            info!(timeout_secs = timeout, "idle timeout reached");
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }
}

/// Inactivity countdown for one tab
#[derive(Clone)]
pub struct IdleMonitor {
    inner: Arc<IdleInner>,
}

impl std::fmt::Debug for IdleMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleMonitor")
            .field("config", &self.inner.config)
            .field("state", &self.state())
            .finish()
    }
}

impl IdleMonitor {
    pub fn new(config: IdleConfig, clock: Arc<dyn Clock>) -> Self {
        let (state, _) = watch::channel(IdleState::default());
        Self { inner: Arc::new(IdleInner { config, clock, state, task: Mutex::new(None) }) }
    }

    /// Arm the countdown; a no-op when idle tracking is disabled
    pub fn start(&self) {
        if !self.inner.config.enabled {
            debug!("idle monitor disabled");
            return;
        }
        self.arm();
    }

    /// Reset the countdown after user activity
    ///
    /// Ignored while the monitor is not running.
    pub fn record_activity(&self) {
        if self.state().phase == IdlePhase::Disabled {
            return;
        }
        self.arm();
    }

    /// Stop counting and return to the disabled phase
    pub fn stop(&self) {
        if let Some(task) = self.inner.task.lock().take() {
            task.stop();
        }
        self.inner.state.send_replace(IdleState::default());
    }

    #[must_use]
    pub fn state(&self) -> IdleState {
        *self.inner.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<IdleState> {
        self.inner.state.subscribe()
    }

    fn arm(&self) {
        let now = self.inner.clock.now_millis();
        self.inner.state.send_replace(IdleState::armed(now, self.inner.config.timeout_secs));

        let mut slot = self.inner.task.lock();
        if slot.as_ref().is_some_and(ScheduledTask::is_running) {
            return;
        }
        let weak: Weak<IdleInner> = Arc::downgrade(&self.inner);
        *slot = Some(ScheduledTask::every(
            "idle-monitor",
            Duration::from_millis(IDLE_TICK_MS),
            move || {
                let weak = weak.clone();
                async move {
                    match weak.upgrade() {
                        Some(inner) => inner.tick(),
                        None => ControlFlow::Break(()),
                    }
                }
            },
        ));
    }
}
