#![allow(dead_code)]

use std::collections::BTreeMap;

use priojob::JobPriority;
use priojob::config::{ConfigFile, JobSpec, ManagerConfig, RawConfigFile};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                manager: ManagerConfig::default(),
                job: BTreeMap::new(),
            },
        }
    }

    pub fn with_job(mut self, name: &str, job: JobSpec) -> Self {
        self.config.job.insert(name.to_string(), job);
        self
    }

    pub fn max_active_jobs(mut self, n: usize) -> Self {
        self.config.manager.max_active_jobs = n;
        self
    }

    pub fn default_priority(mut self, p: JobPriority) -> Self {
        self.config.manager.default_priority = p;
        self
    }

    /// The unvalidated config, for tests that exercise validation itself.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `JobSpec`.
pub struct JobSpecBuilder {
    job: JobSpec,
}

impl JobSpecBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            job: JobSpec {
                cmd: cmd.to_string(),
                priority: None,
            },
        }
    }

    pub fn priority(mut self, p: JobPriority) -> Self {
        self.job.priority = Some(p);
        self
    }

    pub fn build(self) -> JobSpec {
        self.job
    }
}
