use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures_util::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    EditError, EditingClients, Task, imaging,
    task_queue::queue::{Dispatch, Next, TaskQueue},
};

/// One execution unit of the pool. Processes a single task at a time and
/// only looks at the stop signal between tasks.
#[derive(Debug)]
pub(crate) struct Worker {
    pub(crate) index: usize,
    pub(crate) generation: u64,
    pub(crate) queue: Arc<TaskQueue>,
    pub(crate) clients: EditingClients,
    pub(crate) request_timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) cancel: CancellationToken,
}

impl Worker {
    pub(crate) async fn run(self) {
        debug!(worker = self.index, "worker started");

        loop {
            if self.cancel.is_cancelled() {
                break;
            }

            match self.queue.next(self.generation).await {
                Next::Task(dispatch) => {
                    let task = self.execute(dispatch).await;
                    if self.queue.complete(task).await {
                        // Wake idle peers so they exit without waiting out a poll.
                        self.cancel.cancel();
                    }
                }
                Next::Closed => break,
                Next::Empty => {
                    tokio::select! {
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_interval) => {}
                    }
                }
            }
        }

        debug!(worker = self.index, "worker exited");
    }

    async fn execute(&self, dispatch: Dispatch) -> Task {
        let Dispatch { mut task, conflict } = dispatch;

        info!(
            worker = self.index,
            task_id = %task.id(),
            path = %task.source().display(),
            model = %task.model(),
            "processing task"
        );

        let result = if conflict {
            Err(EditError::OutputConflict {
                path: task.output_path().to_path_buf(),
            })
        } else {
            match AssertUnwindSafe(self.process(&task)).catch_unwind().await {
                Ok(result) => result,
                Err(panic) => {
                    let msg = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "panic".to_string());
                    error!(worker = self.index, task_id = %task.id(), "task panicked: {msg}");
                    Err(EditError::Internal(msg))
                }
            }
        };

        let recorded = match result {
            Ok(bytes) => {
                info!(
                    task_id = %task.id(),
                    output = %task.output_path().display(),
                    "task succeeded"
                );
                task.succeed(bytes)
            }
            Err(err) => {
                warn!(task_id = %task.id(), path = %task.source().display(), "task failed: {err}");
                task.fail(err)
            }
        };

        if let Err(e) = recorded {
            error!(task_id = %task.id(), "could not record task outcome: {e}");
        }

        task
    }

    async fn process(&self, task: &Task) -> Result<Vec<u8>, EditError> {
        let request = task.params().validate(task.model())?;

        let client = self.clients.get(task.model()).ok_or_else(|| {
            EditError::Validation(format!(
                "no editing client configured for the {} model",
                task.model()
            ))
        })?;

        let image = imaging::load_as_png(task.source()).await?;

        debug!(
            task_id = %task.id(),
            client = client.name(),
            image_bytes = image.len(),
            "calling editing service"
        );

        let edited = tokio::time::timeout(
            self.request_timeout,
            client.edit(&image, &request, self.request_timeout),
        )
        .await
        .map_err(|_| EditError::Timeout(self.request_timeout))??;

        imaging::publish(task.output_path(), &edited).await?;

        Ok(edited)
    }
}
