//! SQLite backend for routine-sync.
//!
//! This crate provides:
//!
//! - **`connector`**: [`SqliteConnector`], a rusqlite implementation of the
//!   [`Connector`](routine_sync_db::Connector) seam.
//! - **`schema`**: SQL for the `{prefix}routines` catalog table and the
//!   catalog query over it.
//! - **`migration`**: [`CatalogMigration`] to create, drop and inspect the
//!   catalog table.
//! - **`store`**: [`RoutineStore`] to register and remove routines.
//!
//! # Quick start
//!
//! ```no_run
//! use routine_sync_core::RoutineKind;
//! use routine_sync_db::ContextConfig;
//! use routine_sync_sqlite::{CatalogEntry, CatalogMigration, RoutineStore, synchronizer_for};
//! use rusqlite::Connection;
//!
//! let mut migration = CatalogMigration::new(Connection::open("catalog.db").unwrap(), "information_schema_").unwrap();
//! migration.up().unwrap();
//!
//! let mut store = RoutineStore::new(migration.into_connection(), "information_schema_").unwrap();
//! store
//!     .register(&CatalogEntry::new("main", "GetUsers", RoutineKind::Procedure, "SELECT * FROM users;"))
//!     .unwrap();
//!
//! let config = ContextConfig::new("sqlite:catalog.db", "database/schema");
//! let report = synchronizer_for(config).unwrap().synchronize();
//! println!("{}", report.message);
//! ```

mod connector;
mod convert;
mod error;
mod migration;
mod schema;
mod store;

pub use connector::{SqliteConnector, SqliteSession, catalog_for, synchronizer_for};
pub use error::{Result, SqliteError};
pub use migration::{CatalogMigration, CatalogStatus};
pub use schema::{generate_drop_sql, generate_schema_sql, routine_catalog_sql};
pub use store::{CatalogEntry, DEFAULT_SCHEMA, Registration, RoutineStore};
