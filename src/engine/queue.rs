// src/engine/queue.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::job::JobRef;
use crate::types::JobPriority;

/// A pending job together with the level it was queued at.
#[derive(Clone)]
pub struct QueueEntry {
    pub priority: JobPriority,
    pub job: JobRef,
}

impl fmt::Debug for QueueEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueEntry")
            .field("priority", &self.priority)
            .field("job", &self.job.name())
            .finish()
    }
}

/// Pending jobs, partitioned by priority level.
///
/// Semantics:
/// - One FIFO per level; equal-priority jobs come out in the order they went
///   in.
/// - [`try_dequeue_highest`](Self::try_dequeue_highest) scans the levels from
///   `VeryHigh` down and pops the head of the first non-empty one, so a
///   `VeryHigh` job queued after a `Low` job is still served first.
/// - With five fixed levels a linear scan is all that is needed; no heap.
///
/// All operations take a short internal lock, so the queue can be shared
/// between callers enqueueing work and the dispatch loop.
#[derive(Default)]
pub struct PriorityQueue {
    levels: Mutex<[VecDeque<JobRef>; JobPriority::COUNT]>,
}

impl fmt::Debug for PriorityQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriorityQueue")
            .field("pending", &self.pending_by_priority())
            .finish()
    }
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `job` to the back of its priority level.
    pub fn enqueue(&self, job: JobRef, priority: JobPriority) {
        let mut levels = self.lock();
        let level = &mut levels[priority.index()];
        level.push_back(job);
        debug!(%priority, depth = level.len(), "job enqueued");
    }

    /// Pop the oldest job of the highest non-empty level, if any.
    ///
    /// Never blocks waiting for work.
    pub fn try_dequeue_highest(&self) -> Option<QueueEntry> {
        let mut levels = self.lock();
        JobPriority::DESCENDING.into_iter().find_map(|priority| {
            levels[priority.index()]
                .pop_front()
                .map(|job| QueueEntry { priority, job })
        })
    }

    /// Put a previously dequeued entry back at the *head* of its level.
    ///
    /// Used when shutdown interrupts the dispatch loop between dequeuing a
    /// job and launching it; the job keeps its place for the next run.
    pub fn requeue_front(&self, entry: QueueEntry) {
        let mut levels = self.lock();
        levels[entry.priority.index()].push_front(entry.job);
        debug!(priority = %entry.priority, "job returned to the head of its level");
    }

    /// Total number of pending jobs.
    pub fn len(&self) -> usize {
        self.lock().iter().map(VecDeque::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().iter().all(VecDeque::is_empty)
    }

    /// Number of pending jobs at one level.
    pub fn len_of(&self, priority: JobPriority) -> usize {
        self.lock()[priority.index()].len()
    }

    /// Per-level pending counts, highest priority first.
    pub fn pending_by_priority(&self) -> Vec<(JobPriority, usize)> {
        let levels = self.lock();
        JobPriority::DESCENDING
            .into_iter()
            .map(|priority| (priority, levels[priority.index()].len()))
            .collect()
    }

    // The guarded data is a set of plain deques; a panic while holding the
    // lock cannot leave them half-updated, so poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, [VecDeque<JobRef>; JobPriority::COUNT]> {
        self.levels.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
