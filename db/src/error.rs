//! Error types for configuration, command execution, and synchronization.
//!
//! Each component boundary has its own error enum. None of them escape the
//! boundary as a panic: executor errors are wrapped in an
//! [`Outcome`](routine_sync_core::Outcome), and synchronization errors are
//! logged and collected in the [`SyncReport`](crate::SyncReport).

use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use routine_sync_core::{BoxError, CommandKind};
use thiserror::Error;

/// Errors that can occur while loading or validating a [`ContextConfig`](crate::ContextConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O failure.
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// No configuration file exists at any candidate location.
    #[error("configuration file not found (searched: {0})")]
    NotFound(String),

    /// The connection string is empty or whitespace.
    #[error("the connection string in the configuration is not valid")]
    BlankConnectionString,

    /// The schema directory is empty or whitespace.
    #[error("the schema directory in the configuration is not valid")]
    BlankSchemaDirectory,
}

/// Errors raised while executing a single command.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The connection could not be opened.
    #[error("connection failed: {0}")]
    Connect(#[source] BoxError),

    /// The driver failed while preparing, binding, or reading results.
    #[error("driver error: {0}")]
    Driver(#[source] BoxError),

    /// The command exceeded its deadline.
    #[error("command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The backend cannot run this kind of command.
    #[error("{0} commands are not supported by this backend")]
    Unsupported(CommandKind),

    /// A parameter could not be bound.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The connection failed to close cleanly.
    #[error("failed to close connection: {0}")]
    Close(#[source] BoxError),
}

impl ExecuteError {
    pub fn connect(source: impl Into<BoxError>) -> Self {
        ExecuteError::Connect(source.into())
    }

    pub fn driver(source: impl Into<BoxError>) -> Self {
        ExecuteError::Driver(source.into())
    }
}

/// A filesystem failure recorded during a synchronization run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("could not delete '{}': {source}", path.display())]
    Delete { path: PathBuf, source: io::Error },

    #[error("could not create '{}': {source}", path.display())]
    Create { path: PathBuf, source: io::Error },

    #[error("could not write '{}': {source}", path.display())]
    Write { path: PathBuf, source: io::Error },

    /// Building or swapping a staged kind directory failed. The previous
    /// contents of `path` are left in place.
    #[error("could not stage '{}': {source}", path.display())]
    Stage { path: PathBuf, source: io::Error },
}

impl SyncError {
    /// Path the failed operation targeted.
    pub fn path(&self) -> &Path {
        match self {
            SyncError::Delete { path, .. }
            | SyncError::Create { path, .. }
            | SyncError::Write { path, .. }
            | SyncError::Stage { path, .. } => path,
        }
    }
}

/// Convenience alias for results with [`ConfigError`].
pub type Result<T> = std::result::Result<T, ConfigError>;
