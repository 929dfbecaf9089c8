// src/job/mod.rs

//! The unit of work the engine schedules.
//!
//! - [`Job`] is the trait callers implement.
//! - [`JobRef`] is how jobs are shared between the queue, the active set and
//!   event observers.
//! - [`error`] holds [`AggregateError`], the failure value carried by
//!   `JobFailed` notifications.

pub mod error;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

pub use error::{AggregateError, JobPanicked};

/// Future returned by [`Job::start`].
///
/// It must be `'static` because every job runs on its own Tokio task.
pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

/// Shared handle to a job.
pub type JobRef = Arc<dyn Job>;

/// A caller-supplied unit of asynchronous work.
///
/// `start` is called exactly once per dispatch, on the job's own task, with a
/// cancellation token derived from the engine's current run. Cancellation is
/// cooperative: a job that ignores the token is still awaited when the engine
/// stops.
///
/// The job finishes successfully by resolving to `Ok(())`. Any error (or a
/// panic, including one raised synchronously inside `start`) is reported
/// through the failure channel. Returning an [`AggregateError`] reports each
/// of its causes individually; any other error is reported as a single cause.
pub trait Job: Send + Sync + 'static {
    fn start(&self, cancel: CancellationToken) -> JobFuture;

    /// Name used in log output.
    fn name(&self) -> &str {
        "job"
    }
}

/// Reference equality for jobs.
///
/// Jobs have no identity beyond the allocation they live in, so this compares
/// data pointers (ignoring vtables, which may differ across codegen units).
/// Either side may be a concrete `Arc<T>` or a [`JobRef`].
pub fn same_job<A: ?Sized, B: ?Sized>(a: &Arc<A>, b: &Arc<B>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}
