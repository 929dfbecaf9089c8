// src/engine/manager.rs

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ManagerConfig;
use crate::engine::active::{ActiveSet, DispatchId};
use crate::engine::events::{JobCompleted, JobEvent, JobEvents, JobFailed, JobStarted};
use crate::engine::idle::IdleSignal;
use crate::engine::queue::PriorityQueue;
use crate::errors::{PriojobError, Result};
use crate::job::JobRef;
use crate::types::JobPriority;

/// State shared between the manager, the dispatch loop and job runners.
///
/// The queue and the active set each carry their own lock, so enqueueing
/// never contends with start/stop.
#[derive(Debug)]
pub(crate) struct EngineShared {
    pub(crate) max_active_jobs: usize,
    pub(crate) queue: PriorityQueue,
    pub(crate) active: ActiveSet,
    pub(crate) idle: IdleSignal,
    pub(crate) events: JobEvents,
    next_dispatch_id: AtomicU64,
}

impl EngineShared {
    fn new(max_active_jobs: usize) -> Self {
        Self {
            max_active_jobs,
            queue: PriorityQueue::new(),
            active: ActiveSet::new(),
            idle: IdleSignal::new(),
            events: JobEvents::new(),
            next_dispatch_id: AtomicU64::new(1),
        }
    }

    pub(crate) fn next_dispatch_id(&self) -> DispatchId {
        self.next_dispatch_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Lifecycle state; only touched under the manager's lifecycle lock.
#[derive(Debug)]
pub(crate) struct EngineState {
    /// Cancellation scope handed to the running dispatch loop and every job
    /// it launches. Replaced with a fresh token after each stop.
    pub(crate) scope: CancellationToken,
    /// The dispatch loop task, while one is running.
    pub(crate) worker: Option<JoinHandle<()>>,
}

/// In-process priority job scheduler.
///
/// Jobs are queued with [`enqueue`](Self::enqueue) and dispatched, highest
/// priority first, by a single background dispatch loop that keeps at most
/// [`max_active_jobs`](Self::max_active_jobs) jobs running at once.
///
/// - [`start`](Self::start) spawns the dispatch loop (needs a Tokio runtime).
/// - [`stop`](Self::stop) cancels the current run and waits for every
///   running job to finish. The manager can be started again afterwards.
/// - Notifications are available through `on_job_*` observers and
///   [`subscribe`](Self::subscribe).
///
/// Jobs queued while the manager is stopped wait for the next start.
pub struct JobManager {
    pub(crate) shared: Arc<EngineShared>,
    pub(crate) lifecycle: Mutex<EngineState>,
    pub(crate) working: AtomicBool,
    pub(crate) disposed: AtomicBool,
}

impl fmt::Debug for JobManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobManager")
            .field("max_active_jobs", &self.shared.max_active_jobs)
            .field("working", &self.is_working())
            .field("pending", &self.shared.queue.len())
            .field("active", &self.shared.active.count())
            .finish_non_exhaustive()
    }
}

impl JobManager {
    /// Create a stopped manager.
    ///
    /// Fails with [`PriojobError::InvalidMaxActiveJobs`] when
    /// `max_active_jobs` is zero.
    pub fn new(max_active_jobs: usize) -> Result<Self> {
        if max_active_jobs == 0 {
            return Err(PriojobError::InvalidMaxActiveJobs(max_active_jobs));
        }

        debug!(max_active_jobs, "job manager created");

        Ok(Self {
            shared: Arc::new(EngineShared::new(max_active_jobs)),
            lifecycle: Mutex::new(EngineState {
                scope: CancellationToken::new(),
                worker: None,
            }),
            working: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        })
    }

    pub fn from_config(config: &ManagerConfig) -> Result<Self> {
        Self::new(config.max_active_jobs)
    }

    /// Queue `job` at `priority`.
    ///
    /// Wakes the dispatch loop if it is idle. The same job may be queued more
    /// than once; each entry is dispatched separately.
    pub fn enqueue(&self, job: JobRef, priority: JobPriority) -> Result<()> {
        self.ensure_not_disposed()?;

        debug!(job = job.name(), %priority, "enqueue");
        self.shared.queue.enqueue(job, priority);
        self.shared.idle.release();
        Ok(())
    }

    /// Queue `job` at [`JobPriority::Normal`].
    pub fn enqueue_default(&self, job: JobRef) -> Result<()> {
        self.enqueue(job, JobPriority::default())
    }

    /// Queue `job` at a raw numeric priority level (0 = very low, 4 = very
    /// high). Out-of-range values fail with [`PriojobError::InvalidPriority`]
    /// and nothing is queued.
    pub fn enqueue_raw(&self, job: JobRef, raw_priority: i32) -> Result<()> {
        let priority = JobPriority::try_from(raw_priority)?;
        self.enqueue(job, priority)
    }

    /// Whether a dispatch loop is currently running.
    pub fn is_working(&self) -> bool {
        self.working.load(Ordering::SeqCst)
    }

    pub fn max_active_jobs(&self) -> usize {
        self.shared.max_active_jobs
    }

    /// Number of queued jobs not yet dispatched.
    pub fn pending_count(&self) -> usize {
        self.shared.queue.len()
    }

    /// Per-level queued counts, highest priority first.
    pub fn pending_by_priority(&self) -> Vec<(JobPriority, usize)> {
        self.shared.queue.pending_by_priority()
    }

    /// Number of jobs currently executing.
    pub fn active_count(&self) -> usize {
        self.shared.active.count()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn on_job_started<F>(&self, observer: F)
    where
        F: Fn(&JobStarted) + Send + Sync + 'static,
    {
        self.shared.events.on_job_started(observer);
    }

    pub fn on_job_completed<F>(&self, observer: F)
    where
        F: Fn(&JobCompleted) + Send + Sync + 'static,
    {
        self.shared.events.on_job_completed(observer);
    }

    pub fn on_job_failed<F>(&self, observer: F)
    where
        F: Fn(&JobFailed) + Send + Sync + 'static,
    {
        self.shared.events.on_job_failed(observer);
    }

    /// Receive job events on an async channel.
    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.shared.events.subscribe()
    }

    pub(crate) fn ensure_not_disposed(&self) -> Result<()> {
        if self.is_disposed() {
            return Err(PriojobError::Disposed);
        }
        Ok(())
    }
}

impl Drop for JobManager {
    fn drop(&mut self) {
        if !self.working.load(Ordering::SeqCst) {
            return;
        }

        // Dropping cannot await the loop; cancel the run and let the detached
        // loop drain its jobs on its own.
        let state = self.lifecycle.get_mut();
        state.scope.cancel();
        self.shared.idle.release();
        info!(
            active = self.shared.active.count(),
            "job manager dropped while working; dispatch loop will drain in the background"
        );
    }
}
