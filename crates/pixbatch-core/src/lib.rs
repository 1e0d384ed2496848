//! Core of the batch image editor: tasks, the editing-client seam and the
//! concurrent dispatch engine.

pub mod client;
pub mod error;
mod ids;
pub mod imaging;
pub mod task;
pub mod task_queue;

pub use client::{ClientError, EditingClient, EditingClients};
pub use error::{EditError, IoStage};
pub use ids::TaskId;
pub use task::{
    EditParams, EditRequest, ModelKind, ParamValue, RetouchKind, Task, TaskOutcome,
    TaskTransitionError,
};
pub use task_queue::{
    Notification, Phase, RunSnapshot, SchedulerError, SchedulerOptions, TaskManager,
};
