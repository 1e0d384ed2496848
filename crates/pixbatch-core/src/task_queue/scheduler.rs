use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;
use tokio::{
    runtime::Handle,
    sync::{Mutex, mpsc},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    EditingClients, Task,
    task_queue::{
        errors::SchedulerError,
        messages::Notification,
        queue::{Phase, RunSnapshot, TaskQueue},
        worker::Worker,
    },
};

pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Worker count used by [`TaskManager::start_configured`].
    pub concurrency: usize,
    /// Upper bound for a single editing call.
    pub request_timeout: Duration,
    /// Longest a worker waits on an empty queue before re-checking it.
    pub poll_interval: Duration,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl SchedulerOptions {
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[derive(Debug)]
struct RunHandle {
    cancel: CancellationToken,
    workers: Vec<JoinHandle<()>>,
}

/// Owns the task queue and the worker pool, and reports progress to a
/// single observer.
///
/// ```no_run
/// # use pixbatch_core::{EditingClients, EditParams, ModelKind, Task, TaskManager};
/// # async fn run(clients: EditingClients) -> Result<(), Box<dyn std::error::Error>> {
/// let manager = TaskManager::default();
/// let mut events = manager.subscribe().await;
///
/// manager
///     .enqueue(vec![Task::new("/in/a.jpg", "/out", ModelKind::Retouch, EditParams::new())])
///     .await;
/// manager.start(clients, 5).await?;
///
/// while let Some(event) = events.recv().await {
///     if event.is_final() {
///         break;
///     }
/// }
/// manager.join().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct TaskManager {
    queue: Arc<TaskQueue>,
    options: SchedulerOptions,
    run: Mutex<Option<RunHandle>>,
}

impl Default for TaskManager {
    fn default() -> Self {
        Self::new(SchedulerOptions::default())
    }
}

impl TaskManager {
    pub fn new(options: SchedulerOptions) -> Self {
        Self {
            queue: Arc::new(TaskQueue::new()),
            options,
            run: Mutex::new(None),
        }
    }

    /// Registers the observer, replacing any previous one.
    pub async fn subscribe(&self) -> mpsc::UnboundedReceiver<Notification> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.queue.set_observer(tx).await;
        rx
    }

    /// Appends tasks to the queue. During a run they are picked up by the
    /// running workers and count towards the run's total.
    pub async fn enqueue(&self, tasks: impl IntoIterator<Item = Task>) -> usize {
        self.queue.enqueue(tasks.into_iter().collect()).await
    }

    /// Launches `concurrency` workers and returns without waiting for them.
    pub async fn start(
        &self,
        clients: EditingClients,
        concurrency: usize,
    ) -> Result<(), SchedulerError> {
        if concurrency == 0 {
            return Err(SchedulerError::InvalidConcurrency);
        }
        let handle = Handle::try_current().map_err(|_| SchedulerError::NoRuntime)?;

        let mut run = self.run.lock().await;
        let started = self.queue.begin_run().await?;

        // Workers of an earlier run that was never joined stay tracked so
        // the next join() still waits for them.
        let leftover = match run.take() {
            Some(old) => {
                old.cancel.cancel();
                old.workers
            }
            None => Vec::new(),
        };

        let cancel = CancellationToken::new();
        let mut workers: Vec<JoinHandle<()>> = if started.total == 0 {
            Vec::new()
        } else {
            info!(
                concurrency,
                total = started.total,
                timeout_secs = self.options.request_timeout.as_secs(),
                "starting workers"
            );

            (0..concurrency)
                .map(|index| {
                    let worker = Worker {
                        index,
                        generation: started.generation,
                        queue: Arc::clone(&self.queue),
                        clients: clients.clone(),
                        request_timeout: self.options.request_timeout,
                        poll_interval: self.options.poll_interval,
                        cancel: cancel.clone(),
                    };
                    handle.spawn(worker.run())
                })
                .collect()
        };

        workers.extend(leftover);
        *run = Some(RunHandle { cancel, workers });
        Ok(())
    }

    /// [`start`](Self::start) with the concurrency from [`SchedulerOptions`].
    pub async fn start_configured(&self, clients: EditingClients) -> Result<(), SchedulerError> {
        self.start(clients, self.options.concurrency).await
    }

    /// Requests a graceful shutdown: in-flight tasks finish, queued ones are
    /// dropped. Safe to call repeatedly.
    pub async fn stop(&self) {
        // Held across both steps so a concurrent start() cannot slip a new
        // run in between the queue stop and the cancellation.
        let run = self.run.lock().await;

        match self.queue.stop().await {
            Some(abandoned) => {
                info!(abandoned, "scheduler stopping");
                if let Some(run) = run.as_ref() {
                    run.cancel.cancel();
                }
            }
            None => info!("stop requested with no active run"),
        }
    }

    /// Waits for every worker of the current run to exit.
    pub async fn join(&self) {
        let workers = match self.run.lock().await.as_mut() {
            Some(run) => std::mem::take(&mut run.workers),
            None => return,
        };

        for result in join_all(workers).await {
            if let Err(e) = result {
                error!("worker terminated abnormally: {e}");
            }
        }
    }

    pub async fn snapshot(&self) -> RunSnapshot {
        self.queue.snapshot().await
    }

    /// True from `start()` until the run's final notification.
    pub async fn is_running(&self) -> bool {
        self.snapshot().await.phase != Phase::Idle
    }
}
