// tests/observers.rs

use std::error::Error;
use std::sync::{Arc, Mutex};

use priojob::{JobEvent, JobManager, JobPriority};
use priojob_test_utils::fake_job::FakeJob;
use priojob_test_utils::recorder::{EventRecorder, Kind};
use priojob_test_utils::{init_tracing, wait_until, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn observers_run_in_registration_order() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;
    let calls: Arc<Mutex<Vec<&str>>> = Arc::new(Mutex::new(Vec::new()));

    for label in ["first", "second", "third"] {
        let calls = Arc::clone(&calls);
        manager.on_job_completed(move |_| calls.lock().unwrap().push(label));
    }

    manager.enqueue(FakeJob::succeeding("job"), JobPriority::Normal)?;
    with_timeout(manager.start()).await?;
    wait_until("observers called", || calls.lock().unwrap().len() == 3).await;

    assert_eq!(*calls.lock().unwrap(), vec!["first", "second", "third"]);
    with_timeout(manager.stop()).await?;
    Ok(())
}

#[tokio::test]
async fn panicking_observer_is_isolated() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;

    manager.on_job_started(|_| panic!("observer bug"));
    manager.on_job_completed(|_| panic!("observer bug"));
    let recorder = EventRecorder::attach(&manager);

    manager.enqueue(FakeJob::succeeding("one"), JobPriority::Normal)?;
    manager.enqueue(FakeJob::succeeding("two"), JobPriority::Normal)?;
    with_timeout(manager.start()).await?;

    // Later observers still ran, and the loop kept dispatching.
    wait_until("both jobs completed", || recorder.count(Kind::Completed) == 2).await;
    assert_eq!(recorder.count(Kind::Started), 2);
    assert!(manager.is_working());

    with_timeout(manager.stop()).await?;
    Ok(())
}

#[tokio::test]
async fn events_carry_the_queued_priority() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;
    let recorder = EventRecorder::attach(&manager);

    manager.enqueue(FakeJob::succeeding("vh"), JobPriority::VeryHigh)?;
    manager.enqueue(FakeJob::failing("vl", "no"), JobPriority::VeryLow)?;
    with_timeout(manager.start()).await?;
    wait_until("both finished", || recorder.terminal_count() == 2).await;
    with_timeout(manager.stop()).await?;

    for event in recorder.events() {
        let expected = if event.job == "vh" {
            JobPriority::VeryHigh
        } else {
            JobPriority::VeryLow
        };
        assert_eq!(event.priority, expected, "{event:?}");
    }
    Ok(())
}

#[tokio::test]
async fn subscribers_see_started_then_completed() -> TestResult {
    init_tracing();
    let manager = JobManager::new(1)?;
    let mut events = manager.subscribe();

    manager.enqueue(FakeJob::succeeding("watched"), JobPriority::High)?;
    with_timeout(manager.start()).await?;

    let first = with_timeout(events.recv()).await?;
    let second = with_timeout(events.recv()).await?;

    assert!(matches!(first, JobEvent::Started(_)));
    assert!(!first.is_terminal());
    assert!(matches!(second, JobEvent::Completed(_)));
    assert!(second.is_terminal());
    assert_eq!(second.job().name(), "watched");
    assert_eq!(second.priority(), JobPriority::High);

    with_timeout(manager.stop()).await?;
    Ok(())
}
