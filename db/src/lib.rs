//! SQL command execution and routine synchronization.
//!
//! This crate is backend-agnostic. A backend implements [`Connector`] and
//! [`Session`]; everything above that seam works with any of them:
//!
//! - [`Executor`] runs one command and returns an
//!   [`Outcome`](routine_sync_core::Outcome) of untyped rows.
//! - [`RoutineCatalog`] projects the catalog query's rows into
//!   [`Routine`](routine_sync_core::Routine) records.
//! - [`Synchronizer`] replaces the routine files under a schema directory
//!   and returns a [`SyncReport`].
//!
//! # Quick start
//!
//! ```no_run
//! # fn run<C: routine_sync_db::Connector>(connector: C) -> routine_sync_db::Result<()> {
//! use routine_sync_db::{ContextConfig, INFORMATION_SCHEMA_ROUTINES_SQL, Synchronizer};
//!
//! let path = ContextConfig::locate(None)?;
//! let config = ContextConfig::load(path)?;
//!
//! let report = Synchronizer::new(config, connector, INFORMATION_SCHEMA_ROUTINES_SQL)
//!     .synchronize();
//! println!("{}", report.message);
//! # Ok(())
//! # }
//! ```

mod catalog;
mod config;
mod error;
mod executor;
mod layout;
mod sync;

pub use catalog::{INFORMATION_SCHEMA_ROUTINES_SQL, RoutineCatalog, routine_from_row};
pub use config::{
    ContextConfig, DEFAULT_CATALOG_PREFIX, DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_CONFIG_FILE,
};
pub use error::{ConfigError, ExecuteError, Result, SyncError};
pub use executor::{Connector, DEFAULT_TIMEOUT, Executor, Request, RowSink, Session};
pub use layout::{
    FILE_EXTENSION, FUNCTIONS_DIR, PROCEDURES_DIR, SCALAR_DIR, SchemaLayout, TABLE_DIR, file_name,
};
pub use sync::{KindCounts, SyncReport, SyncStatus, Synchronizer, WrittenFile};
