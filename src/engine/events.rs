// src/engine/events.rs

//! Job lifecycle notifications.
//!
//! Two delivery paths carry the same events:
//! - observers registered with `on_job_*`, invoked synchronously on the
//!   dispatch path (started) or on the job's runner task (completed/failed),
//!   in registration order;
//! - a broadcast channel for async consumers (`JobEvents::subscribe`).
//!
//! A panicking observer is caught and logged; it never reaches the dispatch
//! loop and the remaining observers still run.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::error;

use crate::job::{AggregateError, JobRef};
use crate::types::JobPriority;

/// Capacity of the event broadcast channel. Slow subscribers lag and lose
/// the oldest events rather than blocking the dispatch path.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// A job was launched.
#[derive(Clone)]
pub struct JobStarted {
    pub priority: JobPriority,
    pub job: JobRef,
}

/// A job finished without error.
#[derive(Clone)]
pub struct JobCompleted {
    pub priority: JobPriority,
    pub job: JobRef,
}

/// A job finished with one or more errors.
#[derive(Clone)]
pub struct JobFailed {
    pub priority: JobPriority,
    pub job: JobRef,
    pub error: Arc<AggregateError>,
}

/// Any of the three notifications, as delivered on the broadcast channel.
#[derive(Clone, Debug)]
pub enum JobEvent {
    Started(JobStarted),
    Completed(JobCompleted),
    Failed(JobFailed),
}

impl JobEvent {
    pub fn priority(&self) -> JobPriority {
        match self {
            JobEvent::Started(e) => e.priority,
            JobEvent::Completed(e) => e.priority,
            JobEvent::Failed(e) => e.priority,
        }
    }

    pub fn job(&self) -> &JobRef {
        match self {
            JobEvent::Started(e) => &e.job,
            JobEvent::Completed(e) => &e.job,
            JobEvent::Failed(e) => &e.job,
        }
    }

    /// `true` for completion and failure.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Started(_))
    }
}

impl fmt::Debug for JobStarted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobStarted")
            .field("priority", &self.priority)
            .field("job", &self.job.name())
            .finish()
    }
}

impl fmt::Debug for JobCompleted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobCompleted")
            .field("priority", &self.priority)
            .field("job", &self.job.name())
            .finish()
    }
}

impl fmt::Debug for JobFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobFailed")
            .field("priority", &self.priority)
            .field("job", &self.job.name())
            .field("error", &self.error.to_string())
            .finish()
    }
}

type Observer<E> = Arc<dyn Fn(&E) + Send + Sync + 'static>;

/// Ordered list of observers for one notification kind.
struct ObserverList<E> {
    kind: &'static str,
    observers: RwLock<Vec<Observer<E>>>,
}

impl<E> ObserverList<E> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            observers: RwLock::new(Vec::new()),
        }
    }

    fn register(&self, observer: Observer<E>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    fn len(&self) -> usize {
        self.observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn notify(&self, event: &E) {
        // Clone the list so an observer may register further observers
        // without deadlocking on the lock.
        let observers: Vec<Observer<E>> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for (index, observer) in observers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| observer(event))).is_err() {
                error!(
                    kind = self.kind,
                    observer = index,
                    "job event observer panicked; continuing with remaining observers"
                );
            }
        }
    }
}

/// Registry of job notification observers plus the event broadcast.
pub struct JobEvents {
    started: ObserverList<JobStarted>,
    completed: ObserverList<JobCompleted>,
    failed: ObserverList<JobFailed>,
    tx: broadcast::Sender<JobEvent>,
}

impl fmt::Debug for JobEvents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobEvents")
            .field("started_observers", &self.started.len())
            .field("completed_observers", &self.completed.len())
            .field("failed_observers", &self.failed.len())
            .field("subscribers", &self.tx.receiver_count())
            .finish()
    }
}

impl Default for JobEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl JobEvents {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            started: ObserverList::new("job_started"),
            completed: ObserverList::new("job_completed"),
            failed: ObserverList::new("job_failed"),
            tx,
        }
    }

    pub fn on_job_started<F>(&self, observer: F)
    where
        F: Fn(&JobStarted) + Send + Sync + 'static,
    {
        self.started.register(Arc::new(observer));
    }

    pub fn on_job_completed<F>(&self, observer: F)
    where
        F: Fn(&JobCompleted) + Send + Sync + 'static,
    {
        self.completed.register(Arc::new(observer));
    }

    pub fn on_job_failed<F>(&self, observer: F)
    where
        F: Fn(&JobFailed) + Send + Sync + 'static,
    {
        self.failed.register(Arc::new(observer));
    }

    /// Receive every future event on an async channel.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.tx.subscribe()
    }

    pub(crate) fn emit_started(&self, event: JobStarted) {
        self.started.notify(&event);
        self.broadcast(JobEvent::Started(event));
    }

    pub(crate) fn emit_completed(&self, event: JobCompleted) {
        self.completed.notify(&event);
        self.broadcast(JobEvent::Completed(event));
    }

    pub(crate) fn emit_failed(&self, event: JobFailed) {
        self.failed.notify(&event);
        self.broadcast(JobEvent::Failed(event));
    }

    fn broadcast(&self, event: JobEvent) {
        // No subscribers is the common case.
        let _ = self.tx.send(event);
    }
}
