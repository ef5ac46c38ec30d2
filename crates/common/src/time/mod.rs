//! Clocks and cancellable recurring tasks
//!
//! Session timers (token expiry watcher, idle countdown) read wall-clock time
//! through a [`Clock`] and run as [`ScheduledTask`]s so they can be stopped
//! individually and never outlive their owner.

mod clock;
mod task;

pub use clock::{Clock, MockClock, SystemClock, TokioClock};
pub use task::ScheduledTask;
