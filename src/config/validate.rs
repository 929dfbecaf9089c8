// src/config/validate.rs

use crate::config::model::{ConfigFile, ManagerConfig, RawConfigFile};
use crate::errors::{PriojobError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PriojobError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.manager, raw.job))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_jobs(cfg)?;
    validate_manager_config(&cfg.manager)?;
    validate_job_commands(cfg)?;
    Ok(())
}

fn ensure_has_jobs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.job.is_empty() {
        return Err(PriojobError::ConfigError(
            "config must contain at least one [job.<name>] section".to_string(),
        ));
    }
    Ok(())
}

/// Check the `[manager]` section on its own.
///
/// Also used by callers that build a [`ManagerConfig`] programmatically or
/// override it from the command line.
pub fn validate_manager_config(manager: &ManagerConfig) -> Result<()> {
    // Priorities are strongly typed and validated during deserialization.

    if manager.max_active_jobs == 0 {
        return Err(PriojobError::ConfigError(
            "[manager].max_active_jobs must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(())
}

fn validate_job_commands(cfg: &RawConfigFile) -> Result<()> {
    for (name, spec) in cfg.job.iter() {
        if spec.cmd.trim().is_empty() {
            return Err(PriojobError::ConfigError(format!(
                "job '{}' has an empty `cmd`",
                name
            )));
        }
    }
    Ok(())
}
