// src/engine/mod.rs

//! Scheduling engine.
//!
//! Leaves first:
//! - [`queue`]: pending jobs per priority level ([`PriorityQueue`]).
//! - [`active`]: jobs currently executing and their completion handles
//!   ([`ActiveSet`]).
//! - [`idle`]: the park/wake signal the dispatch loop sleeps on
//!   ([`IdleSignal`]).
//! - [`events`]: observer registry and event broadcast ([`JobEvents`]).
//! - [`dispatch`]: the bounded-concurrency dispatch loop.
//! - [`lifecycle`]: start/stop/dispose.
//! - [`manager`]: the public [`JobManager`] façade.

pub mod active;
mod dispatch;
pub mod events;
pub mod idle;
mod lifecycle;
pub mod manager;
pub mod queue;

pub use active::{ActiveJob, ActiveSet, CompletionHandle, DispatchId};
pub use events::{JobCompleted, JobEvent, JobEvents, JobFailed, JobStarted};
pub use idle::IdleSignal;
pub use manager::JobManager;
pub use queue::{PriorityQueue, QueueEntry};
