#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("scheduler is already running")]
    AlreadyRunning,

    #[error("concurrency must be at least 1")]
    InvalidConcurrency,

    #[error("no tokio runtime available to spawn workers")]
    NoRuntime,
}
