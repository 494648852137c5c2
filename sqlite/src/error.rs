//! Error types for the SQLite backend.
//!
//! These cover the catalog table lifecycle and routine registration.
//! Command execution through [`SqliteConnector`](crate::SqliteConnector)
//! reports [`ExecuteError`](routine_sync_db::ExecuteError) instead.

use thiserror::Error;

/// Errors that can occur while managing the SQLite routine catalog.
#[derive(Debug, Error)]
pub enum SqliteError {
    /// SQLite database operation failure.
    #[error("database error: {0}")]
    DatabaseError(#[from] rusqlite::Error),

    /// A routine cannot be represented as a catalog entry.
    #[error("conversion error: {0}")]
    ConversionError(String),

    /// Catalog table lifecycle operation failure.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Table prefix contains invalid characters.
    #[error("invalid prefix '{0}': must contain only alphanumeric characters and underscores")]
    InvalidPrefix(String),

    /// No catalog entry matches the requested routine.
    #[error("routine not found: {0}")]
    RoutineNotFound(String),
}

/// Convenience alias for results with [`SqliteError`].
pub type Result<T> = std::result::Result<T, SqliteError>;
