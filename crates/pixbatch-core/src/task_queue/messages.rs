use std::path::PathBuf;

use serde::Serialize;

use crate::TaskId;

/// Events delivered to the registered observer, in the order the scheduler
/// produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Notification {
    Progress {
        completed: usize,
        total: usize,
    },
    TaskCompleted {
        id: TaskId,
        path: PathBuf,
        success: bool,
        error: Option<String>,
    },
    AllCompleted {
        succeeded: usize,
        failed: usize,
    },
    /// Last event of a run cut short by `stop()`.
    Stopped {
        succeeded: usize,
        failed: usize,
        abandoned: usize,
    },
}

impl Notification {
    /// True for the event that closes a run.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            Notification::AllCompleted { .. } | Notification::Stopped { .. }
        )
    }
}
