// src/engine/lifecycle.rs

//! Start/stop/dispose for [`JobManager`].
//!
//! Transitions are serialised by an async lifecycle lock. Only one start or
//! stop is in flight at a time; job admission never takes this lock.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::MutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::engine::dispatch::DispatchLoop;
use crate::engine::manager::{EngineState, JobManager};
use crate::errors::{PriojobError, Result};

impl JobManager {
    /// Start dispatching queued jobs.
    ///
    /// A no-op if the manager is already working.
    pub async fn start(&self) -> Result<()> {
        self.start_with(&CancellationToken::new()).await
    }

    /// Like [`start`](Self::start), but the request itself can be abandoned
    /// through `cancel`.
    ///
    /// Fails with [`PriojobError::Cancelled`] if `cancel` is already cancelled
    /// or fires while waiting for the lifecycle lock. Once the lock is held
    /// the start always completes.
    pub async fn start_with(&self, cancel: &CancellationToken) -> Result<()> {
        self.ensure_not_disposed()?;
        let mut state = self.lock_lifecycle(cancel).await?;
        self.ensure_not_disposed()?;

        let loop_alive = state.worker.as_ref().is_some_and(|w| !w.is_finished());
        if self.is_working() && loop_alive {
            debug!("start requested while already working; ignoring");
            return Ok(());
        }

        let dispatch = DispatchLoop::new(Arc::clone(&self.shared), state.scope.clone());
        state.worker = Some(tokio::spawn(dispatch.run()));
        self.working.store(true, Ordering::SeqCst);

        info!(
            max_active_jobs = self.shared.max_active_jobs,
            pending = self.shared.queue.len(),
            "job manager started"
        );
        Ok(())
    }

    /// Stop dispatching and wait for every running job to finish.
    ///
    /// Running jobs see their cancellation token fire; jobs that ignore it
    /// are still awaited. Queued jobs stay queued for the next start. A no-op
    /// if the manager is not working.
    pub async fn stop(&self) -> Result<()> {
        self.stop_with(&CancellationToken::new()).await
    }

    /// Like [`stop`](Self::stop), but the request itself can be abandoned
    /// through `cancel` while it waits for the lifecycle lock.
    pub async fn stop_with(&self, cancel: &CancellationToken) -> Result<()> {
        self.ensure_not_disposed()?;
        let mut state = self.lock_lifecycle(cancel).await?;
        self.stop_locked(&mut state).await;
        Ok(())
    }

    /// Stop the manager and refuse further use.
    ///
    /// Idempotent and infallible, including when the manager was never
    /// started. Afterwards `enqueue`, `start` and `stop` fail with
    /// [`PriojobError::Disposed`].
    pub async fn dispose(&self) {
        let mut state = self.lifecycle.lock().await;
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.stop_locked(&mut state).await;
        info!("job manager disposed");
    }

    async fn stop_locked(&self, state: &mut EngineState) {
        if !self.is_working() {
            debug!("stop requested while not working; ignoring");
            return;
        }

        self.working.store(false, Ordering::SeqCst);

        info!(
            active = self.shared.active.count(),
            pending = self.shared.queue.len(),
            "stopping job manager"
        );

        // Swap in the next run's scope before awaiting anything, so a stop
        // whose future is dropped mid-drain cannot leave a cancelled scope
        // behind for the next start.
        let finished_scope = std::mem::replace(&mut state.scope, CancellationToken::new());
        finished_scope.cancel();
        self.shared.idle.release();

        if let Some(worker) = state.worker.as_mut() {
            if let Err(err) = worker.await {
                error!(error = %err, "dispatch loop task ended abnormally");
            }
        }
        state.worker = None;

        info!(pending = self.shared.queue.len(), "job manager stopped");
    }

    async fn lock_lifecycle(
        &self,
        cancel: &CancellationToken,
    ) -> Result<MutexGuard<'_, EngineState>> {
        if cancel.is_cancelled() {
            return Err(PriojobError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PriojobError::Cancelled),
            guard = self.lifecycle.lock() => Ok(guard),
        }
    }
}
