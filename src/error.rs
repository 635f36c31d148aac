//! Error types for Sluice

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Sluice operations
pub type Result<T> = std::result::Result<T, SluiceError>;

/// Main error type for Sluice
#[derive(Error, Debug)]
pub enum SluiceError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Task execution errors
    #[error("{0}")]
    Task(#[from] TaskError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// YAML parsing errors
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Configuration parsing and validation errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to find config file (searched: {0})")]
    NotFound(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid glob pattern '{pattern}': {error}")]
    InvalidGlob { pattern: String, error: String },

    #[error("Unknown style compatibility level '{0}' (expected ie8, ie9, ie10, ie11 or *)")]
    UnknownCompatibility(String),

    #[error("Path '{0}' must stay inside the project root")]
    OutsideRoot(PathBuf),

    #[error("Task '{0}' is not defined")]
    TaskNotFound(String),

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),
}

/// Task execution errors
#[derive(Error, Debug)]
pub enum TaskError {
    #[error("Task '{task}' failed: {source:#}")]
    Failed {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Task '{0}' is not defined")]
    NotFound(String),

    #[error("Task '{0}' is already running in this sequence")]
    Recursion(String),
}

/// Specialized result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Specialized result type for task operations
pub type TaskResult<T> = std::result::Result<T, TaskError>;

impl TaskError {
    /// Name of the task this error belongs to
    pub fn task(&self) -> &str {
        match self {
            TaskError::Failed { task, .. } => task,
            TaskError::NotFound(name) | TaskError::Recursion(name) => name,
        }
    }
}
