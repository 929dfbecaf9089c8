// src/exec/command.rs

//! Shell command job.

use std::process::Stdio;

use anyhow::Context;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::job::{Job, JobFuture};

/// The command exited with a non-zero status.
#[derive(Debug, Error)]
#[error("command for job '{job}' exited with code {code}")]
pub struct CommandFailed {
    pub job: String,
    /// Exit code, or -1 if the process was terminated by a signal.
    pub code: i32,
}

/// The engine cancelled the run and the process was killed.
#[derive(Debug, Error)]
#[error("command for job '{job}' was cancelled")]
pub struct CommandCancelled {
    pub job: String,
}

/// A job that runs one shell command.
///
/// - Unix: `sh -c <cmd>`; Windows: `cmd /C <cmd>`.
/// - stdout is inherited so job output stays visible; stderr lines are
///   logged at `debug`.
/// - Exit status 0 completes the job; anything else fails it with
///   [`CommandFailed`].
/// - When the cancellation token fires the child is killed and the job fails
///   with [`CommandCancelled`].
#[derive(Debug, Clone)]
pub struct CommandJob {
    name: String,
    cmd: String,
}

impl CommandJob {
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
        }
    }

    pub fn cmd(&self) -> &str {
        &self.cmd
    }
}

impl Job for CommandJob {
    fn start(&self, cancel: CancellationToken) -> JobFuture {
        let name = self.name.clone();
        let cmd = self.cmd.clone();
        Box::pin(run_command(name, cmd, cancel))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

async fn run_command(name: String, cmd_line: String, cancel: CancellationToken) -> anyhow::Result<()> {
    info!(job = %name, cmd = %cmd_line, "starting job process");

    // Build a shell command appropriate for the platform.
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(&cmd_line);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(&cmd_line);
        c
    };

    cmd.stdout(Stdio::inherit())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawning process for job '{name}'"))?;

    // Always consume stderr so buffers don't fill; log at debug.
    if let Some(stderr) = child.stderr.take() {
        let job_name = name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(job = %job_name, "stderr: {}", line);
            }
        });
    }

    tokio::select! {
        status_res = child.wait() => {
            let status = status_res
                .with_context(|| format!("waiting for process of job '{name}'"))?;
            let code = status.code().unwrap_or(-1);

            info!(
                job = %name,
                exit_code = code,
                success = status.success(),
                "job process exited"
            );

            if status.success() {
                Ok(())
            } else {
                Err(CommandFailed { job: name, code }.into())
            }
        }

        _ = cancel.cancelled() => {
            info!(job = %name, "cancellation requested; killing job process");
            if let Err(e) = child.kill().await {
                warn!(job = %name, error = %e, "failed to kill job process on cancellation");
            }
            Err(CommandCancelled { job: name }.into())
        }
    }
}
