// src/engine/active.rs

//! Bookkeeping for jobs that are currently executing.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;

use crate::job::JobRef;
use crate::types::JobPriority;

/// Sequence number assigned to each launch of a job.
///
/// The same job may be queued (and therefore running) more than once, so the
/// active set is keyed by launch rather than by job.
pub type DispatchId = u64;

/// Awaitable, cloneable view of "this job has reached its terminal
/// notification".
#[derive(Debug, Clone)]
pub struct CompletionHandle {
    rx: watch::Receiver<bool>,
}

/// Write side of a [`CompletionHandle`], owned by the job's runner task.
///
/// Dropping it without calling [`complete`](Self::complete) also releases
/// waiters, so a runner that dies unexpectedly never wedges a drain.
#[derive(Debug)]
pub struct CompletionSender {
    tx: watch::Sender<bool>,
}

/// Create a linked completion sender/handle pair.
pub fn completion_pair() -> (CompletionSender, CompletionHandle) {
    let (tx, rx) = watch::channel(false);
    (CompletionSender { tx }, CompletionHandle { rx })
}

impl CompletionSender {
    pub fn complete(self) {
        // No receivers left is fine: nobody is waiting.
        let _ = self.tx.send(true);
    }
}

impl CompletionHandle {
    /// Resolve once the job is done.
    pub async fn wait(mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            // Err means the sender is gone, which also counts as done.
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_done(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }
}

/// A job that has been launched and not yet reached a terminal state.
#[derive(Clone)]
pub struct ActiveJob {
    pub id: DispatchId,
    pub priority: JobPriority,
    pub job: JobRef,
    pub completion: CompletionHandle,
}

impl fmt::Debug for ActiveJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveJob")
            .field("id", &self.id)
            .field("priority", &self.priority)
            .field("job", &self.job.name())
            .finish_non_exhaustive()
    }
}

/// Currently executing jobs and their completion handles.
///
/// This is a bookkeeping structure, not an admission gate: the concurrency
/// bound is enforced by the dispatch loop waiting for a free slot before it
/// admits anything.
#[derive(Debug, Default)]
pub struct ActiveSet {
    jobs: Mutex<HashMap<DispatchId, ActiveJob>>,
}

impl ActiveSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a launched job.
    pub fn admit(
        &self,
        id: DispatchId,
        priority: JobPriority,
        job: JobRef,
        completion: CompletionHandle,
    ) {
        self.lock().insert(
            id,
            ActiveJob {
                id,
                priority,
                job,
                completion,
            },
        );
    }

    /// Remove a job that reached a terminal state.
    ///
    /// Returns `None` if it was already removed.
    pub fn remove(&self, id: DispatchId) -> Option<ActiveJob> {
        self.lock().remove(&id)
    }

    /// Completion handles of every job active right now.
    pub fn snapshot(&self) -> Vec<CompletionHandle> {
        self.lock()
            .values()
            .map(|active| active.completion.clone())
            .collect()
    }

    /// Full entries of every job active right now (for diagnostics).
    pub fn entries(&self) -> Vec<ActiveJob> {
        self.lock().values().cloned().collect()
    }

    pub fn count(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<DispatchId, ActiveJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
