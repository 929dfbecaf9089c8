// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod job;
pub mod logging;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, default_config_path};
use crate::config::loader::load_and_validate;
use crate::config::validate::validate_manager_config;
use crate::exec::CommandJob;

pub use crate::engine::{JobEvent, JobManager};
pub use crate::errors::PriojobError;
pub use crate::job::{AggregateError, Job, JobFuture, JobRef, same_job};
pub use crate::types::JobPriority;

/// Terminal outcome of one configured job, as seen by the CLI.
#[derive(Debug)]
enum JobOutcome {
    Completed(String),
    Failed(String, String),
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (plus the `--max-active-jobs` override)
/// - the job manager and one `CommandJob` per `[job.<name>]`
/// - Ctrl-C handling
///
/// Returns an error if any job failed.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = args.config.clone().unwrap_or_else(default_config_path);
    let mut cfg = load_and_validate(&config_path)?;

    if let Some(max_active_jobs) = args.max_active_jobs {
        cfg.manager.max_active_jobs = max_active_jobs;
        validate_manager_config(&cfg.manager)?;
    }

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let manager = JobManager::from_config(&cfg.manager)?;

    // Observers forward terminal outcomes to this task.
    let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<JobOutcome>();
    {
        let tx = outcome_tx.clone();
        manager.on_job_completed(move |e| {
            let _ = tx.send(JobOutcome::Completed(e.job.name().to_string()));
        });
    }
    {
        let tx = outcome_tx;
        manager.on_job_failed(move |e| {
            let _ = tx.send(JobOutcome::Failed(
                e.job.name().to_string(),
                e.error.to_string(),
            ));
        });
    }
    manager.on_job_started(|e| {
        info!(job = e.job.name(), priority = %e.priority, "job started");
    });

    for (name, spec) in cfg.job.iter() {
        let priority = cfg.priority_of(spec);
        let job: Arc<CommandJob> = Arc::new(CommandJob::new(name.clone(), spec.cmd.clone()));
        manager.enqueue(job, priority)?;
    }

    // Ctrl-C → graceful shutdown.
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            return;
        }
        let _ = shutdown_tx.send(()).await;
    });

    let total = cfg.job.len();
    info!(
        jobs = total,
        max_active_jobs = manager.max_active_jobs(),
        "running configured jobs"
    );

    manager.start().await?;

    let mut finished = 0usize;
    let mut failed: Vec<(String, String)> = Vec::new();

    while finished < total {
        tokio::select! {
            outcome = outcome_rx.recv() => {
                let Some(outcome) = outcome else { break };
                finished += 1;
                debug!(?outcome, finished, total, "job finished");
                if let JobOutcome::Failed(name, error) = outcome {
                    failed.push((name, error));
                }
            }
            Some(()) = shutdown_rx.recv() => {
                warn!(finished, total, "Ctrl-C received; stopping job manager");
                break;
            }
        }
    }

    manager.stop().await?;
    let not_run = manager.pending_count();
    manager.dispose().await;

    info!(
        completed = finished - failed.len(),
        failed = failed.len(),
        not_run,
        "all done"
    );

    if !failed.is_empty() {
        let names: Vec<String> = failed
            .iter()
            .map(|(name, error)| format!("{name} ({error})"))
            .collect();
        anyhow::bail!("{} of {} jobs failed: {}", failed.len(), total, names.join(", "));
    }

    if not_run > 0 {
        anyhow::bail!("interrupted with {not_run} job(s) still queued");
    }

    Ok(())
}

/// Simple dry-run output: print settings and jobs in dispatch order.
fn print_dry_run(cfg: &ConfigFile) {
    println!("priojob dry-run");
    println!("  manager.max_active_jobs = {}", cfg.manager.max_active_jobs);
    println!("  manager.default_priority = {}", cfg.manager.default_priority);
    println!();

    println!("jobs ({}), in dispatch order:", cfg.job.len());
    for (name, spec, priority) in cfg.jobs_in_dispatch_order() {
        println!("  - {name} [{priority}]");
        println!("      cmd: {}", spec.cmd);
    }

    debug!("dry-run complete (no execution)");
}
