use std::{
    collections::{HashSet, VecDeque},
    fmt,
    path::PathBuf,
};

use serde::Serialize;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info};

use crate::{
    Task,
    task_queue::{errors::SchedulerError, messages::Notification},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Running,
    /// `stop()` was called and in-flight tasks are still finishing.
    Stopping,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "Idle"),
            Phase::Running => write!(f, "Running"),
            Phase::Stopping => write!(f, "Stopping"),
        }
    }
}

/// Copy of the aggregate counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSnapshot {
    pub phase: Phase,
    pub total: usize,
    pub completed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub in_flight: usize,
    pub queued: usize,
}

/// A task handed to a worker, with the output path claim already settled.
#[derive(Debug)]
pub(crate) struct Dispatch {
    pub(crate) task: Task,
    /// Another task of this run already owns the same output path.
    pub(crate) conflict: bool,
}

#[derive(Debug)]
pub(crate) enum Next {
    Task(Dispatch),
    Empty,
    /// The run this worker belongs to is over.
    Closed,
}

#[derive(Debug)]
pub(crate) struct RunStart {
    pub(crate) generation: u64,
    pub(crate) total: usize,
}

#[derive(Debug)]
struct State {
    pending: VecDeque<Task>,
    phase: Phase,
    generation: u64,

    total: usize,
    completed: usize,
    succeeded: usize,
    failed: usize,
    /// Dequeued but not yet reported. Checked against zero in the same
    /// critical section that records a completion.
    in_flight: usize,
    abandoned: usize,

    claimed: HashSet<PathBuf>,
    observer: Option<mpsc::UnboundedSender<Notification>>,
}

impl State {
    fn emit(&self, notification: Notification) {
        if let Some(observer) = &self.observer {
            if observer.send(notification).is_err() {
                debug!("observer dropped, notification discarded");
            }
        }
    }

    fn snapshot(&self) -> RunSnapshot {
        RunSnapshot {
            phase: self.phase,
            total: self.total,
            completed: self.completed,
            succeeded: self.succeeded,
            failed: self.failed,
            in_flight: self.in_flight,
            queued: self.pending.len(),
        }
    }

    fn finish_stopped(&mut self) {
        self.phase = Phase::Idle;
        info!(
            succeeded = self.succeeded,
            failed = self.failed,
            abandoned = self.abandoned,
            "run stopped"
        );
        self.emit(Notification::Stopped {
            succeeded: self.succeeded,
            failed: self.failed,
            abandoned: self.abandoned,
        });
    }
}

/// FIFO of pending tasks plus the run counters, all behind one lock so a
/// completion and the "is everything done" decision can never interleave.
#[derive(Debug)]
pub(crate) struct TaskQueue {
    state: Mutex<State>,
}

impl TaskQueue {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                pending: VecDeque::new(),
                phase: Phase::Idle,
                generation: 0,
                total: 0,
                completed: 0,
                succeeded: 0,
                failed: 0,
                in_flight: 0,
                abandoned: 0,
                claimed: HashSet::new(),
                observer: None,
            }),
        }
    }

    pub(crate) async fn set_observer(&self, observer: mpsc::UnboundedSender<Notification>) {
        self.state.lock().await.observer = Some(observer);
    }

    pub(crate) async fn enqueue(&self, tasks: Vec<Task>) -> usize {
        let mut state = self.state.lock().await;

        let added = tasks.len();
        for task in tasks {
            debug!(task_id = %task.id(), path = %task.source().display(), "enqueue task");
            state.pending.push_back(task);
        }

        // Outside a run the total is recomputed at the next start.
        if state.phase == Phase::Running {
            state.total += added;
        } else {
            state.total = state.completed + state.pending.len();
        }

        added
    }

    pub(crate) async fn begin_run(&self) -> Result<RunStart, SchedulerError> {
        let mut state = self.state.lock().await;

        if state.phase != Phase::Idle {
            return Err(SchedulerError::AlreadyRunning);
        }

        state.generation += 1;
        state.phase = Phase::Running;
        state.total = state.pending.len();
        state.completed = 0;
        state.succeeded = 0;
        state.failed = 0;
        state.abandoned = 0;
        state.claimed.clear();

        info!(generation = state.generation, total = state.total, "run started");

        if state.total == 0 {
            state.phase = Phase::Idle;
            info!("nothing queued, run complete");
            state.emit(Notification::AllCompleted {
                succeeded: 0,
                failed: 0,
            });
        }

        Ok(RunStart {
            generation: state.generation,
            total: state.total,
        })
    }

    pub(crate) async fn next(&self, generation: u64) -> Next {
        let mut state = self.state.lock().await;

        if state.generation != generation || state.phase != Phase::Running {
            return Next::Closed;
        }

        let Some(task) = state.pending.pop_front() else {
            return Next::Empty;
        };

        state.in_flight += 1;
        let conflict = !state.claimed.insert(task.output_path().to_path_buf());

        debug!(
            task_id = %task.id(),
            in_flight = state.in_flight,
            queued = state.pending.len(),
            "task dequeued"
        );

        Next::Task(Dispatch { task, conflict })
    }

    /// Records a finished task and emits its notifications. Returns `true`
    /// when this completion closed the run.
    pub(crate) async fn complete(&self, task: Task) -> bool {
        let mut state = self.state.lock().await;

        state.in_flight = state.in_flight.saturating_sub(1);
        state.completed += 1;

        let success = task.is_success();
        if success {
            state.succeeded += 1;
        } else {
            state.failed += 1;
        }

        state.emit(Notification::Progress {
            completed: state.completed,
            total: state.total,
        });
        state.emit(Notification::TaskCompleted {
            id: task.id().clone(),
            path: task.source().to_path_buf(),
            success,
            error: task.error().map(ToString::to_string),
        });

        match state.phase {
            Phase::Running
                if state.in_flight == 0
                    && state.pending.is_empty()
                    && state.completed == state.total =>
            {
                state.phase = Phase::Idle;
                info!(
                    succeeded = state.succeeded,
                    failed = state.failed,
                    "all tasks completed"
                );
                state.emit(Notification::AllCompleted {
                    succeeded: state.succeeded,
                    failed: state.failed,
                });
                true
            }
            Phase::Stopping if state.in_flight == 0 => {
                state.finish_stopped();
                true
            }
            _ => false,
        }
    }

    /// Abandons everything still queued. Returns the number of tasks dropped,
    /// or `None` when no run was active.
    pub(crate) async fn stop(&self) -> Option<usize> {
        let mut state = self.state.lock().await;

        if state.phase != Phase::Running {
            return None;
        }

        let abandoned = state.pending.len();
        state.pending.clear();
        state.abandoned = abandoned;
        state.phase = Phase::Stopping;

        info!(
            abandoned,
            in_flight = state.in_flight,
            "stop requested, draining in-flight tasks"
        );

        if state.in_flight == 0 {
            state.finish_stopped();
        }

        Some(abandoned)
    }

    pub(crate) async fn snapshot(&self) -> RunSnapshot {
        self.state.lock().await.snapshot()
    }
}
