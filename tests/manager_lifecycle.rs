// tests/manager_lifecycle.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use priojob::{JobManager, JobPriority, PriojobError};
use priojob_test_utils::fake_job::FakeJob;
use priojob_test_utils::recorder::{EventRecorder, Kind};
use priojob_test_utils::{init_tracing, wait_until, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[test]
fn zero_max_active_jobs_is_rejected() {
    let err = JobManager::new(0).expect_err("0 must be rejected");
    assert!(matches!(err, PriojobError::InvalidMaxActiveJobs(0)));
}

#[tokio::test]
async fn new_manager_is_stopped() -> TestResult {
    let manager = JobManager::new(3)?;
    assert!(!manager.is_working());
    assert_eq!(manager.max_active_jobs(), 3);
    assert_eq!(manager.pending_count(), 0);
    assert_eq!(manager.active_count(), 0);
    Ok(())
}

#[tokio::test]
async fn start_and_stop_toggle_is_working() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;

    with_timeout(manager.start()).await?;
    assert!(manager.is_working());

    with_timeout(manager.stop()).await?;
    assert!(!manager.is_working());
    Ok(())
}

#[tokio::test]
async fn start_and_stop_are_idempotent() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;

    with_timeout(manager.stop()).await?;
    assert!(!manager.is_working());

    with_timeout(manager.start()).await?;
    with_timeout(manager.start()).await?;
    assert!(manager.is_working());

    with_timeout(manager.stop()).await?;
    with_timeout(manager.stop()).await?;
    assert!(!manager.is_working());
    Ok(())
}

#[tokio::test]
async fn restart_after_stop_dispatches_with_fresh_scope() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;
    let recorder = EventRecorder::attach(&manager);

    with_timeout(manager.start()).await?;
    with_timeout(manager.stop()).await?;

    // Jobs launched after a restart must not see the previous cancellation.
    let job = FakeJob::cancellable("after-restart");
    manager.enqueue(job.clone(), JobPriority::Normal)?;
    with_timeout(manager.start()).await?;

    wait_until("job started", || job.starts() == 1).await;
    job.release();
    wait_until("job completed", || recorder.count(Kind::Completed) == 1).await;
    assert_eq!(job.cancellations_seen(), 0);

    with_timeout(manager.stop()).await?;
    Ok(())
}

#[tokio::test]
async fn start_with_cancelled_token_fails_without_starting() -> TestResult {
    let manager = JobManager::new(1)?;
    let token = CancellationToken::new();
    token.cancel();

    let err = manager.start_with(&token).await.expect_err("must be cancelled");
    assert!(matches!(err, PriojobError::Cancelled));
    assert!(!manager.is_working());
    Ok(())
}

#[tokio::test]
async fn stop_with_cancelled_token_leaves_manager_running() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;
    with_timeout(manager.start()).await?;

    let token = CancellationToken::new();
    token.cancel();
    let err = manager.stop_with(&token).await.expect_err("must be cancelled");
    assert!(matches!(err, PriojobError::Cancelled));
    assert!(manager.is_working());

    with_timeout(manager.stop()).await?;
    Ok(())
}

#[tokio::test]
async fn stop_waits_for_running_jobs() -> TestResult {
    init_tracing();
    let manager = JobManager::new(2)?;
    let recorder = EventRecorder::attach(&manager);

    let a = FakeJob::cancellable("a");
    let b = FakeJob::cancellable("b");
    manager.enqueue(a.clone(), JobPriority::Normal)?;
    manager.enqueue(b.clone(), JobPriority::Normal)?;
    with_timeout(manager.start()).await?;
    wait_until("both jobs started", || a.starts() == 1 && b.starts() == 1).await;

    with_timeout(manager.stop()).await?;

    // Both runs saw the cancellation and both terminal events were delivered
    // before stop returned.
    assert_eq!(a.cancellations_seen(), 1);
    assert_eq!(b.cancellations_seen(), 1);
    assert_eq!(recorder.count(Kind::Completed), 2);
    assert_eq!(manager.active_count(), 0);
    Ok(())
}

#[tokio::test]
async fn stop_awaits_jobs_that_ignore_cancellation() -> TestResult {
    init_tracing();
    let manager = Arc::new(JobManager::new(1)?);
    let recorder = EventRecorder::attach(&manager);

    let stubborn = FakeJob::blocking("stubborn");
    manager.enqueue(stubborn.clone(), JobPriority::Normal)?;
    with_timeout(manager.start()).await?;
    wait_until("job started", || stubborn.starts() == 1).await;

    let stopping = {
        let manager = Arc::clone(&manager);
        tokio::spawn(async move { manager.stop().await })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!stopping.is_finished(), "stop must wait for the running job");

    stubborn.release();
    with_timeout(stopping).await??;
    assert_eq!(recorder.count(Kind::Completed), 1);
    Ok(())
}

#[tokio::test]
async fn queued_jobs_survive_stop() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;

    let running = FakeJob::cancellable("running");
    let waiting = FakeJob::succeeding("waiting");
    manager.enqueue(running.clone(), JobPriority::High)?;
    manager.enqueue(waiting.clone(), JobPriority::Low)?;

    with_timeout(manager.start()).await?;
    wait_until("first job started", || running.starts() == 1).await;
    with_timeout(manager.stop()).await?;

    assert_eq!(waiting.starts(), 0);
    assert_eq!(manager.pending_count(), 1);

    with_timeout(manager.start()).await?;
    wait_until("queued job ran after restart", || waiting.starts() == 1).await;
    with_timeout(manager.stop()).await?;
    Ok(())
}

#[tokio::test]
async fn dispose_is_idempotent_and_blocks_further_use() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;
    with_timeout(manager.start()).await?;

    with_timeout(manager.dispose()).await;
    with_timeout(manager.dispose()).await;
    assert!(manager.is_disposed());
    assert!(!manager.is_working());

    let job = FakeJob::succeeding("late");
    assert!(matches!(
        manager.enqueue(job, JobPriority::Normal),
        Err(PriojobError::Disposed)
    ));
    assert!(matches!(manager.start().await, Err(PriojobError::Disposed)));
    assert!(matches!(manager.stop().await, Err(PriojobError::Disposed)));
    Ok(())
}

#[tokio::test]
async fn dispose_without_start_is_fine() -> TestResult {
    let manager = JobManager::new(1)?;
    with_timeout(manager.dispose()).await;
    assert!(manager.is_disposed());
    Ok(())
}

#[tokio::test]
async fn enqueue_raw_rejects_out_of_range_priority() -> TestResult {
    let manager = JobManager::new(1)?;

    let err = manager
        .enqueue_raw(FakeJob::succeeding("bad"), 7)
        .expect_err("7 is not a priority");
    assert!(matches!(err, PriojobError::InvalidPriority(_)));
    assert_eq!(manager.pending_count(), 0);

    manager.enqueue_raw(FakeJob::succeeding("ok"), 4)?;
    assert_eq!(
        manager.pending_by_priority()[0],
        (JobPriority::VeryHigh, 1)
    );
    Ok(())
}

#[tokio::test]
async fn abandoned_stop_does_not_poison_next_start() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;
    let recorder = EventRecorder::attach(&manager);

    let stubborn = FakeJob::blocking("stubborn");
    manager.enqueue(stubborn.clone(), JobPriority::Normal)?;
    with_timeout(manager.start()).await?;
    wait_until("stubborn job started", || stubborn.starts() == 1).await;

    // The job ignores cancellation, so this stop cannot finish in time and
    // its future is dropped mid-drain.
    let abandoned = tokio::time::timeout(Duration::from_millis(50), manager.stop()).await;
    assert!(abandoned.is_err(), "stop should still be draining");
    assert!(!manager.is_working());

    stubborn.release();
    wait_until("stubborn job completed", || recorder.count(Kind::Completed) == 1).await;

    with_timeout(manager.start()).await?;
    assert!(manager.is_working());

    let next = FakeJob::succeeding("next");
    manager.enqueue(next.clone(), JobPriority::Normal)?;
    wait_until("job enqueued after restart runs", || next.starts() == 1).await;
    wait_until("job enqueued after restart completes", || {
        recorder.count(Kind::Completed) == 2
    })
    .await;
    assert_eq!(manager.pending_count(), 0);

    with_timeout(manager.stop()).await?;
    assert!(!manager.is_working());
    Ok(())
}

#[tokio::test]
async fn enqueue_default_uses_normal_priority() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;
    let recorder = EventRecorder::attach(&manager);

    manager.enqueue_default(FakeJob::succeeding("plain"))?;
    assert_eq!(manager.pending_by_priority()[2], (JobPriority::Normal, 1));

    with_timeout(manager.start()).await?;
    wait_until("job completed", || recorder.count(Kind::Completed) == 1).await;
    with_timeout(manager.stop()).await?;

    let started: Vec<_> = recorder
        .events()
        .into_iter()
        .filter(|e| e.kind == Kind::Started)
        .collect();
    assert_eq!(started.len(), 1);
    assert_eq!(started[0].job, "plain");
    assert_eq!(started[0].priority, JobPriority::Normal);
    Ok(())
}
