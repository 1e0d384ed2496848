mod inputs;

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result, bail};
use clap::Parser;
use pixbatch_core::{
    EditParams, ModelKind, Notification, SchedulerOptions, Task, TaskManager,
    task::{DEFAULT_SMOOTH, DEFAULT_STYLE_PROMPT, DEFAULT_WHITEN},
    task_queue::DEFAULT_CONCURRENCY,
};
use pixbatch_network::{ApiConfig, clients_from_config};
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// Batch-edit local images through a remote editing service.
#[derive(Debug, Parser)]
#[command(name = "pixbatch", version)]
struct Args {
    /// Image files or directories (jpg, jpeg, png, webp).
    #[arg(short, long = "input", required = true, num_args = 1..)]
    inputs: Vec<PathBuf>,

    /// Directory for `<name>_processed.png` results; created if missing.
    #[arg(short, long)]
    output: PathBuf,

    /// `retouch` (Doubao) or `style` (Banana).
    #[arg(short, long, default_value = "retouch", value_parser = parse_model)]
    model: ModelKind,

    /// Retouch variant: `retouch` or `enhance`.
    #[arg(long, default_value = "retouch")]
    edit_type: String,

    #[arg(long, default_value_t = DEFAULT_SMOOTH)]
    smooth: f64,

    #[arg(long, default_value_t = DEFAULT_WHITEN)]
    whiten: f64,

    /// Style prompt.
    #[arg(long, default_value = DEFAULT_STYLE_PROMPT)]
    prompt: String,

    #[arg(short = 'j', long, default_value_t = DEFAULT_CONCURRENCY)]
    concurrency: usize,

    /// Per-image timeout for the editing call.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,
}

fn parse_model(s: &str) -> Result<ModelKind, String> {
    s.parse().map_err(|e: pixbatch_core::EditError| e.to_string())
}

impl Args {
    fn params(&self) -> EditParams {
        match self.model {
            ModelKind::Retouch => EditParams::new()
                .with("edit_type", self.edit_type.as_str())
                .with("smooth", self.smooth)
                .with("whiten", self.whiten),
            ModelKind::Style => EditParams::new().with("prompt", self.prompt.as_str()),
        }
    }
}

#[derive(Debug, Default)]
struct Summary {
    succeeded: usize,
    failed: usize,
    abandoned: usize,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    match run(Args::parse()).await {
        Ok(summary) if summary.failed == 0 && summary.abandoned == 0 => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: Args) -> Result<Summary> {
    let params = args.params();
    params
        .validate(args.model)
        .context("invalid edit parameters")?;

    let sources = inputs::collect_inputs(&args.inputs)?;
    if sources.is_empty() {
        bail!("no supported images found in the given inputs");
    }

    tokio::fs::create_dir_all(&args.output)
        .await
        .with_context(|| format!("cannot create output directory {}", args.output.display()))?;

    let config = ApiConfig::from_env();
    let clients = clients_from_config(&config, Some(args.model))
        .with_context(|| format!("{} provider is not configured", args.model))?;

    let manager = TaskManager::new(
        SchedulerOptions::default()
            .concurrency(args.concurrency)
            .request_timeout(Duration::from_secs(args.timeout_secs)),
    );
    let mut events = manager.subscribe().await;

    let tasks: Vec<Task> = sources
        .into_iter()
        .map(|source| Task::new(source, &args.output, args.model, params.clone()))
        .collect();

    info!(
        images = tasks.len(),
        model = %args.model,
        concurrency = args.concurrency,
        output = %args.output.display(),
        "starting batch"
    );

    manager.enqueue(tasks).await;
    manager.start_configured(clients).await?;

    let mut summary = Summary::default();
    let mut interrupted = false;

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let done = event.is_final();
                report(&event, &mut summary);
                if done {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                warn!("interrupted, finishing in-flight images");
                interrupted = true;
                manager.stop().await;
            }
        }
    }

    manager.join().await;

    println!(
        "done: {} succeeded, {} failed, {} skipped",
        summary.succeeded, summary.failed, summary.abandoned
    );
    Ok(summary)
}

fn report(event: &Notification, summary: &mut Summary) {
    match event {
        Notification::Progress { completed, total } => {
            info!(completed, total, "progress");
        }
        Notification::TaskCompleted {
            path,
            success: true,
            ..
        } => {
            info!(path = %path.display(), "processed");
        }
        Notification::TaskCompleted { path, error, .. } => {
            warn!(
                path = %path.display(),
                "failed: {}",
                error.as_deref().unwrap_or("unknown error")
            );
        }
        Notification::AllCompleted { succeeded, failed } => {
            summary.succeeded = *succeeded;
            summary.failed = *failed;
        }
        Notification::Stopped {
            succeeded,
            failed,
            abandoned,
        } => {
            summary.succeeded = *succeeded;
            summary.failed = *failed;
            summary.abandoned = *abandoned;
        }
    }
}
