// tests/run_cli.rs
#![cfg(unix)]

use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

use tempfile::{TempDir, tempdir};

use priojob::cli::CliArgs;
use priojob::errors::PriojobError;
use priojob::run;
use priojob_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> Result<(TempDir, PathBuf), Box<dyn Error>> {
    let dir = tempdir()?;
    let path = dir.path().join("Priojob.toml");
    fs::write(&path, contents)?;
    Ok((dir, path))
}

fn args_for(path: &Path) -> CliArgs {
    CliArgs {
        config: Some(path.to_path_buf()),
        max_active_jobs: None,
        log_level: None,
        dry_run: false,
    }
}

#[tokio::test]
async fn all_jobs_succeeding_returns_ok() -> TestResult {
    init_tracing();
    let (_dir, path) = write_config(
        r#"
[manager]
max_active_jobs = 2

[job.first]
cmd = "true"

[job.second]
cmd = "exit 0"
priority = "high"
"#,
    )?;

    with_timeout(run(args_for(&path))).await?;
    Ok(())
}

#[tokio::test]
async fn failing_job_makes_run_fail() -> TestResult {
    init_tracing();
    let (_dir, path) = write_config(
        r#"
[job.passes]
cmd = "true"

[job.broken]
cmd = "false"
"#,
    )?;

    let err = with_timeout(run(args_for(&path)))
        .await
        .expect_err("one job exits non-zero");
    let msg = err.to_string();
    assert!(msg.contains("1 of 2 jobs failed"), "{msg}");
    assert!(msg.contains("broken"), "{msg}");
    assert!(!msg.contains("passes"), "{msg}");
    Ok(())
}

#[tokio::test]
async fn zero_override_is_rejected() -> TestResult {
    init_tracing();
    let (_dir, path) = write_config("[job.only]\ncmd = \"true\"\n")?;

    let mut args = args_for(&path);
    args.max_active_jobs = Some(0);

    let err = with_timeout(run(args)).await.expect_err("0 slots is invalid");
    let config_err = err
        .downcast_ref::<PriojobError>()
        .ok_or("expected a PriojobError")?;
    assert!(matches!(config_err, PriojobError::ConfigError(_)));
    assert!(err.to_string().contains("max_active_jobs"));
    Ok(())
}

#[tokio::test]
async fn override_replaces_config_limit() -> TestResult {
    init_tracing();
    // With one slot the second job would wait for the first, which only
    // finishes once the second has created its file.
    let dir = tempdir()?;
    let flag = dir.path().join("flag");
    let config = format!(
        r#"
[manager]
max_active_jobs = 1

[job.waiter]
cmd = "for i in $(seq 1 100); do [ -f '{flag}' ] && exit 0; sleep 0.02; done; exit 1"
priority = "high"

[job.setter]
cmd = "touch '{flag}'"
"#,
        flag = flag.display()
    );
    let path = dir.path().join("Priojob.toml");
    fs::write(&path, config)?;

    let mut args = args_for(&path);
    args.max_active_jobs = Some(2);
    with_timeout(run(args)).await?;
    Ok(())
}

#[tokio::test]
async fn dry_run_executes_nothing() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let marker = dir.path().join("ran.txt");
    let path = dir.path().join("Priojob.toml");
    fs::write(
        &path,
        format!("[job.marker]\ncmd = \"touch '{}'\"\n", marker.display()),
    )?;

    let mut args = args_for(&path);
    args.dry_run = true;
    with_timeout(run(args)).await?;

    assert!(!marker.exists());
    Ok(())
}

#[tokio::test]
async fn missing_config_file_is_an_error() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let args = args_for(&dir.path().join("absent.toml"));

    let err = with_timeout(run(args)).await.expect_err("no config file");
    assert!(matches!(
        err.downcast_ref::<PriojobError>(),
        Some(PriojobError::IoError(_))
    ));
    Ok(())
}
