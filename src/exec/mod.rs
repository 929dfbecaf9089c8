// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] provides [`CommandJob`], a [`crate::job::Job`] that runs a
//!   shell command via `tokio::process::Command` and kills it when the
//!   engine cancels the run.

pub mod command;

pub use command::{CommandCancelled, CommandFailed, CommandJob};
