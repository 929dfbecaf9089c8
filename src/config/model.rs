// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::JobPriority;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [manager]
/// max_active_jobs = 2
/// default_priority = "normal"
///
/// [job.build]
/// cmd = "cargo build"
/// priority = "high"
///
/// [job.docs]
/// cmd = "cargo doc"
/// priority = "very_low"
/// ```
///
/// All sections are optional and have reasonable defaults. Use
/// `ConfigFile::try_from` (or [`crate::config::load_and_validate`]) to get a
/// validated [`ConfigFile`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Engine settings from `[manager]`.
    #[serde(default)]
    pub manager: ManagerConfig,

    /// Jobs from `[job.<name>]`, keyed by job name.
    #[serde(default)]
    pub job: BTreeMap<String, JobSpec>,
}

/// Validated configuration.
///
/// Only constructed through validation, so holders can rely on
/// `manager.max_active_jobs >= 1` and every job having a non-empty command.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub manager: ManagerConfig,
    pub job: BTreeMap<String, JobSpec>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(manager: ManagerConfig, job: BTreeMap<String, JobSpec>) -> Self {
        Self { manager, job }
    }

    /// Effective priority of a job spec under this config.
    pub fn priority_of(&self, spec: &JobSpec) -> JobPriority {
        spec.priority.unwrap_or(self.manager.default_priority)
    }

    /// Jobs in the order the engine would dispatch them if all were queued
    /// at once: by descending priority, then by name (the order in which
    /// they are enqueued).
    pub fn jobs_in_dispatch_order(&self) -> Vec<(&str, &JobSpec, JobPriority)> {
        let mut jobs: Vec<_> = self
            .job
            .iter()
            .map(|(name, spec)| (name.as_str(), spec, self.priority_of(spec)))
            .collect();
        // Stable sort keeps name order within a priority level.
        jobs.sort_by(|a, b| b.2.cmp(&a.2));
        jobs
    }
}

/// `[manager]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
    /// Maximum number of jobs running at the same time. Must be >= 1.
    #[serde(default = "default_max_active_jobs")]
    pub max_active_jobs: usize,

    /// Priority used for jobs that do not set one.
    #[serde(default)]
    pub default_priority: JobPriority,
}

fn default_max_active_jobs() -> usize {
    1
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            max_active_jobs: default_max_active_jobs(),
            default_priority: JobPriority::default(),
        }
    }
}

/// `[job.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct JobSpec {
    /// Shell command to execute.
    pub cmd: String,

    /// Optional priority; falls back to `manager.default_priority`.
    #[serde(default)]
    pub priority: Option<JobPriority>,
}
