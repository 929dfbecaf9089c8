// src/engine/idle.rs

use tokio::sync::Semaphore;

/// Park/wake primitive for the dispatch loop.
///
/// A counting semaphore that starts with no permits:
/// - [`release`](Self::release) adds one permit, so a release that happens
///   before anyone waits is remembered rather than lost;
/// - [`wait`](Self::wait) parks until a permit is available and consumes it.
///
/// Releases saturate instead of overflowing; the loop only needs to know
/// that *some* wake is pending.
#[derive(Debug)]
pub struct IdleSignal {
    permits: Semaphore,
}

impl Default for IdleSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl IdleSignal {
    pub fn new() -> Self {
        Self {
            permits: Semaphore::new(0),
        }
    }

    /// Wake one waiter (now or in the future).
    pub fn release(&self) {
        if self.permits.available_permits() < Semaphore::MAX_PERMITS {
            self.permits.add_permits(1);
        }
    }

    /// Park until a release is available.
    pub async fn wait(&self) {
        // The semaphore is never closed, so acquiring can only succeed.
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }

    /// Number of releases not yet consumed.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
