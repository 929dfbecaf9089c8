// src/engine/dispatch.rs

//! The dispatch loop: picks the highest-priority pending job, waits for a
//! free slot, launches it, and lets the job's runner report the outcome.

use std::sync::Arc;

use futures::future::{join_all, select_all};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::active::{CompletionHandle, CompletionSender, DispatchId, completion_pair};
use crate::engine::events::{JobCompleted, JobFailed, JobStarted};
use crate::engine::manager::EngineShared;
use crate::engine::queue::QueueEntry;
use crate::job::{AggregateError, JobRef};
use crate::types::JobPriority;

/// One run of the dispatch loop, bound to a single cancellation scope.
pub(crate) struct DispatchLoop {
    shared: Arc<EngineShared>,
    scope: CancellationToken,
}

impl DispatchLoop {
    pub(crate) fn new(shared: Arc<EngineShared>, scope: CancellationToken) -> Self {
        Self { shared, scope }
    }

    /// Main loop.
    ///
    /// - Dequeue the highest-priority job; park on the idle signal if there
    ///   is none.
    /// - Wait for a slot when `max_active_jobs` jobs are already running.
    /// - Launch the job and emit `JobStarted`.
    ///
    /// Once the scope is cancelled the loop stops dispatching and waits for
    /// every active job to reach its terminal notification before returning.
    pub(crate) async fn run(self) {
        info!(
            max_active_jobs = self.shared.max_active_jobs,
            pending = self.shared.queue.len(),
            "dispatch loop started"
        );

        while !self.scope.is_cancelled() {
            let Some(entry) = self.shared.queue.try_dequeue_highest() else {
                self.wait_idle().await;
                continue;
            };

            if !self.wait_for_slot().await {
                debug!(
                    job = entry.job.name(),
                    priority = %entry.priority,
                    "shutdown while waiting for a slot; returning job to the queue"
                );
                self.shared.queue.requeue_front(entry);
                break;
            }

            self.launch(entry);
        }

        self.drain().await;
        info!("dispatch loop finished");
    }

    /// Park until new work is queued or the run is cancelled.
    async fn wait_idle(&self) {
        debug!("queue empty; dispatch loop idle");
        tokio::select! {
            _ = self.shared.idle.wait() => {}
            _ = self.scope.cancelled() => {}
        }
    }

    /// Block while every slot is taken.
    ///
    /// Returns `false` if the run was cancelled before a slot freed up.
    async fn wait_for_slot(&self) -> bool {
        loop {
            if self.scope.is_cancelled() {
                return false;
            }

            let handles = self.shared.active.snapshot();
            if handles.len() < self.shared.max_active_jobs {
                return true;
            }

            debug!(
                active = handles.len(),
                max_active_jobs = self.shared.max_active_jobs,
                "all slots busy; waiting for a job to finish"
            );

            let any_finished = select_all(handles.into_iter().map(|h| Box::pin(h.wait())));
            tokio::select! {
                biased;
                _ = self.scope.cancelled() => return false,
                _ = any_finished => {}
            }
        }
    }

    fn launch(&self, entry: QueueEntry) {
        let QueueEntry { priority, job } = entry;
        let id = self.shared.next_dispatch_id();
        let (done_tx, done) = completion_pair();

        // Admission happens before the runner exists, so the runner's
        // removal can never overtake it.
        self.shared.active.admit(id, priority, Arc::clone(&job), done);

        debug!(
            job = job.name(),
            %priority,
            dispatch_id = id,
            active = self.shared.active.count(),
            "launching job"
        );

        let runner = JobRunner {
            shared: Arc::clone(&self.shared),
            id,
            priority,
            job: Arc::clone(&job),
            cancel: self.scope.child_token(),
        };

        // JobStarted goes out before the job's task is spawned, so it always
        // precedes that job's terminal notification; the job itself may not
        // have begun executing yet.
        self.shared.events.emit_started(JobStarted { priority, job });

        tokio::spawn(runner.run(done_tx));
    }

    /// Wait for every active job to reach its terminal notification.
    async fn drain(&self) {
        let handles: Vec<CompletionHandle> = self.shared.active.snapshot();
        if handles.is_empty() {
            return;
        }

        info!(active = handles.len(), "draining active jobs");
        join_all(handles.into_iter().map(CompletionHandle::wait)).await;
        debug!("all active jobs drained");
    }
}

/// Runs one dispatched job and reports how it ended.
struct JobRunner {
    shared: Arc<EngineShared>,
    id: DispatchId,
    priority: JobPriority,
    job: JobRef,
    cancel: CancellationToken,
}

impl JobRunner {
    async fn run(self, done: CompletionSender) {
        let job = Arc::clone(&self.job);
        let cancel = self.cancel.clone();

        // `start` is called inside the spawned task so that a panic raised
        // synchronously by `start` is captured like any other panic.
        let outcome = tokio::spawn(async move { job.start(cancel).await }).await;

        let name = self.job.name();
        self.shared.active.remove(self.id);

        match outcome {
            Ok(Ok(())) => {
                debug!(job = name, priority = %self.priority, dispatch_id = self.id, "job completed");
                self.shared.events.emit_completed(JobCompleted {
                    priority: self.priority,
                    job: self.job,
                });
            }
            Ok(Err(err)) => {
                let error = AggregateError::from_job_error(err);
                warn!(
                    job = name,
                    priority = %self.priority,
                    dispatch_id = self.id,
                    causes = error.len(),
                    error = %error,
                    "job failed"
                );
                self.report_failure(error);
            }
            Err(join_err) if join_err.is_panic() => {
                let error = AggregateError::from_panic(name, join_err.into_panic());
                error!(
                    job = name,
                    priority = %self.priority,
                    dispatch_id = self.id,
                    error = %error,
                    "job panicked"
                );
                self.report_failure(error);
            }
            Err(join_err) => {
                warn!(
                    job = name,
                    dispatch_id = self.id,
                    error = %join_err,
                    "job task was aborted before finishing"
                );
                let error = AggregateError::from_job_error(anyhow::Error::new(join_err));
                self.report_failure(error);
            }
        }

        done.complete();
    }

    fn report_failure(self, error: AggregateError) {
        self.shared.events.emit_failed(JobFailed {
            priority: self.priority,
            job: self.job,
            error: Arc::new(error),
        });
    }
}
