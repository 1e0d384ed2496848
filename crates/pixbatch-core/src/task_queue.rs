//! Bounded worker pool over a shared FIFO of edit tasks.
//!
//! [`TaskManager`] owns the queue and the run counters; workers pull one
//! task at a time, drive it through load, remote edit and publish, then
//! report back. Every completion and the end-of-run decision happen under
//! the same lock, so the final notification fires exactly once and only
//! after the last in-flight task has reported.

mod errors;
mod messages;
mod queue;
mod scheduler;
mod worker;

pub use errors::SchedulerError;
pub use messages::Notification;
pub use queue::{Phase, RunSnapshot};
pub use scheduler::{
    DEFAULT_CONCURRENCY, DEFAULT_POLL_INTERVAL, DEFAULT_REQUEST_TIMEOUT, SchedulerOptions,
    TaskManager,
};
