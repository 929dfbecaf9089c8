// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PriojobError {
    #[error("max_active_jobs must be >= 1 (got {0})")]
    InvalidMaxActiveJobs(usize),

    #[error("invalid job priority: {0}")]
    InvalidPriority(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("job manager has been disposed")]
    Disposed,

    #[error("operation cancelled before it could acquire the lifecycle lock")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, PriojobError>;
