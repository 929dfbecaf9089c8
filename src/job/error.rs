// src/job/error.rs

use std::any::Any;
use std::fmt;

use thiserror::Error;

/// Terminal failure of a single job execution.
///
/// A job may fan out internally and fail for several reasons at once, so the
/// failure is always a list of causes. A plain error is wrapped as a list of
/// one. The list is never empty.
#[derive(Debug)]
pub struct AggregateError {
    causes: Vec<anyhow::Error>,
}

impl AggregateError {
    /// Build an aggregate from several causes.
    ///
    /// Returns `None` for an empty list; an aggregate without causes would not
    /// describe a failure.
    pub fn new(causes: Vec<anyhow::Error>) -> Option<Self> {
        if causes.is_empty() {
            None
        } else {
            Some(Self { causes })
        }
    }

    /// Normalise the error a job returned into an aggregate.
    ///
    /// If the job already returned an `AggregateError`, its causes are taken
    /// over unchanged (no nesting).
    pub fn from_job_error(err: anyhow::Error) -> Self {
        match err.downcast::<AggregateError>() {
            Ok(aggregate) => aggregate,
            Err(err) => Self { causes: vec![err] },
        }
    }

    /// Aggregate describing a job that panicked.
    pub fn from_panic(job: &str, payload: Box<dyn Any + Send>) -> Self {
        let panicked = JobPanicked {
            job: job.to_string(),
            message: panic_message(payload.as_ref()),
        };
        Self {
            causes: vec![anyhow::Error::new(panicked)],
        }
    }

    pub fn causes(&self) -> &[anyhow::Error] {
        &self.causes
    }

    pub fn len(&self) -> usize {
        self.causes.len()
    }

    /// Always `false`; present for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.causes.is_empty()
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.causes.as_slice() {
            [single] => write!(f, "job failed: {single}"),
            causes => {
                write!(f, "job failed with {} errors", causes.len())?;
                for (i, cause) in causes.iter().enumerate() {
                    write!(f, "; [{i}] {cause}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for AggregateError {}

/// Cause recorded when a job panics instead of returning.
#[derive(Debug, Error)]
#[error("job '{job}' panicked: {message}")]
pub struct JobPanicked {
    pub job: String,
    pub message: String,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
