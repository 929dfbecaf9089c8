use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

use priojob::job::{AggregateError, Job, JobFuture};

/// What a [`FakeJob`] does once started.
#[derive(Debug, Clone)]
pub enum Behaviour {
    /// Finish immediately with `Ok(())`.
    Succeed,
    /// Fail with one [`FakeError`] per message. More than one message is
    /// returned as an `AggregateError`.
    Fail(Vec<String>),
    /// Panic inside the returned future.
    Panic(String),
    /// Panic synchronously inside `Job::start`, before any future exists.
    PanicOnStart(String),
    /// Sleep, ignoring cancellation, then succeed.
    Sleep(Duration),
    /// Block until [`FakeJob::release`] is called. Ignores cancellation.
    UntilReleased,
    /// Block until released or until the engine cancels the run; both
    /// complete successfully.
    UntilReleasedOrCancelled,
}

/// Error returned by failing fake jobs, so tests can downcast causes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeError {
    pub message: String,
}

impl fmt::Display for FakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for FakeError {}

/// Tracks how many jobs sharing it run at the same time.
#[derive(Debug, Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn current(&self) -> usize {
        self.current.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A controllable job for engine tests:
/// - records how often `start` was called (and, optionally, into a shared
///   start-order log);
/// - behaves according to its [`Behaviour`];
/// - optionally reports into a [`ConcurrencyProbe`].
pub struct FakeJob {
    name: String,
    behaviour: Behaviour,
    starts: AtomicUsize,
    release: Arc<Notify>,
    cancelled_seen: Arc<AtomicUsize>,
    start_log: Option<Arc<Mutex<Vec<String>>>>,
    probe: Option<Arc<ConcurrencyProbe>>,
}

impl FakeJob {
    pub fn new(name: &str, behaviour: Behaviour) -> Self {
        Self {
            name: name.to_string(),
            behaviour,
            starts: AtomicUsize::new(0),
            release: Arc::new(Notify::new()),
            cancelled_seen: Arc::new(AtomicUsize::new(0)),
            start_log: None,
            probe: None,
        }
    }

    pub fn succeeding(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Behaviour::Succeed))
    }

    pub fn failing(name: &str, message: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Behaviour::Fail(vec![message.to_string()])))
    }

    pub fn blocking(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Behaviour::UntilReleased))
    }

    pub fn cancellable(name: &str) -> Arc<Self> {
        Arc::new(Self::new(name, Behaviour::UntilReleasedOrCancelled))
    }

    pub fn with_start_log(mut self, log: Arc<Mutex<Vec<String>>>) -> Self {
        self.start_log = Some(log);
        self
    }

    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Number of times `start` has been called.
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of runs that ended because the cancellation token fired.
    pub fn cancellations_seen(&self) -> usize {
        self.cancelled_seen.load(Ordering::SeqCst)
    }

    /// Let one blocked run finish (or the next run, if none is blocked yet).
    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl Job for FakeJob {
    fn start(&self, cancel: CancellationToken) -> JobFuture {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Some(log) = &self.start_log {
            log.lock().unwrap().push(self.name.clone());
        }

        if let Behaviour::PanicOnStart(msg) = &self.behaviour {
            panic!("{msg}");
        }

        let behaviour = self.behaviour.clone();
        let release = Arc::clone(&self.release);
        let cancelled_seen = Arc::clone(&self.cancelled_seen);
        let probe = self.probe.clone();

        Box::pin(async move {
            if let Some(p) = &probe {
                p.enter();
            }

            let result = match behaviour {
                Behaviour::Succeed | Behaviour::PanicOnStart(_) => Ok(()),
                Behaviour::Fail(messages) => Err(fail_with(messages)),
                Behaviour::Panic(msg) => panic!("{msg}"),
                Behaviour::Sleep(d) => {
                    tokio::time::sleep(d).await;
                    Ok(())
                }
                Behaviour::UntilReleased => {
                    release.notified().await;
                    Ok(())
                }
                Behaviour::UntilReleasedOrCancelled => {
                    tokio::select! {
                        _ = release.notified() => {}
                        _ = cancel.cancelled() => {
                            cancelled_seen.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    Ok(())
                }
            };

            if let Some(p) = &probe {
                p.exit();
            }
            result
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn fail_with(messages: Vec<String>) -> anyhow::Error {
    let mut causes: Vec<anyhow::Error> = messages
        .into_iter()
        .map(|message| anyhow::Error::new(FakeError { message }))
        .collect();

    if causes.len() == 1 {
        return causes.remove(0);
    }

    match AggregateError::new(causes) {
        Some(aggregate) => anyhow::Error::new(aggregate),
        None => anyhow::anyhow!("fake job failed without a message"),
    }
}
