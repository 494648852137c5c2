//! Lifecycle of the SQLite routine catalog table.
//!
//! # Example
//!
//! ```no_run
//! use routine_sync_sqlite::CatalogMigration;
//! use rusqlite::Connection;
//!
//! let conn = Connection::open("catalog.db").unwrap();
//! let mut migration = CatalogMigration::new(conn, "information_schema_").unwrap();
//!
//! migration.up().unwrap();
//! let status = migration.status().unwrap();
//! println!("Routines: {}", status.routine_count);
//! ```

use rusqlite::Connection;
use serde::Serialize;

use crate::error::{Result, SqliteError};
use crate::schema::{generate_drop_sql, generate_schema_sql, routines_table, validate_prefix};

/// Creates, drops, and inspects the `{prefix}routines` table.
///
/// Mutations run inside a transaction.
pub struct CatalogMigration {
    conn: Connection,
    prefix: String,
}

impl CatalogMigration {
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix contains invalid characters.
    pub fn new(conn: Connection, prefix: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        validate_prefix(&prefix)?;
        Ok(Self { conn, prefix })
    }

    /// Creates the catalog table and its index. Safe to call repeatedly.
    pub fn up(&mut self) -> Result<()> {
        let sql = generate_schema_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to create catalog: {e}")))?;
        tx.commit()?;
        Ok(())
    }

    /// Drops the catalog table. Safe to call when it does not exist.
    pub fn down(&mut self) -> Result<()> {
        let sql = generate_drop_sql(&self.prefix)?;
        let tx = self.conn.transaction()?;
        tx.execute_batch(&sql)
            .map_err(|e| SqliteError::MigrationError(format!("failed to drop catalog: {e}")))?;
        tx.commit()?;
        Ok(())
    }

    /// Reports whether the table exists and how many routines it holds.
    pub fn status(&self) -> Result<CatalogStatus> {
        if !self.table_exists()? {
            return Ok(CatalogStatus::default());
        }

        let table = routines_table(&self.prefix);
        let (routine_count, procedure_count, function_count): (i64, i64, i64) =
            self.conn.query_row(
                &format!(
                    "SELECT COUNT(*), \
                            COALESCE(SUM(ROUTINE_TYPE = 'PROCEDURE'), 0), \
                            COALESCE(SUM(ROUTINE_TYPE = 'FUNCTION'), 0) \
                     FROM {table}"
                ),
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )?;

        Ok(CatalogStatus {
            table_exists: true,
            routine_count: routine_count as usize,
            procedure_count: procedure_count as usize,
            function_count: function_count as usize,
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }

    fn table_exists(&self) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [routines_table(&self.prefix)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// Snapshot returned by [`CatalogMigration::status`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogStatus {
    pub table_exists: bool,
    pub routine_count: usize,
    pub procedure_count: usize,
    pub function_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn migration() -> CatalogMigration {
        CatalogMigration::new(Connection::open_in_memory().unwrap(), "t_").unwrap()
    }

    #[test]
    fn test_new_validates_prefix() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(CatalogMigration::new(conn, "drop;--").is_err());
    }

    #[test]
    fn test_status_without_table() {
        let status = migration().status().unwrap();
        assert!(!status.table_exists);
        assert_eq!(status.routine_count, 0);
    }

    #[test]
    fn test_up_is_idempotent() {
        let mut migration = migration();
        migration.up().unwrap();
        migration.up().unwrap();
        assert!(migration.status().unwrap().table_exists);
    }

    #[test]
    fn test_status_counts_by_type() {
        let mut migration = migration();
        migration.up().unwrap();
        migration
            .connection()
            .execute_batch(
                "INSERT INTO t_routines (SPECIFIC_NAME, ROUTINE_NAME, ROUTINE_TYPE) VALUES ('a', 'a', 'PROCEDURE');
                 INSERT INTO t_routines (SPECIFIC_NAME, ROUTINE_NAME, ROUTINE_TYPE, DATA_TYPE) VALUES ('b', 'b', 'FUNCTION', 'int');
                 INSERT INTO t_routines (SPECIFIC_NAME, ROUTINE_NAME, ROUTINE_TYPE, DATA_TYPE) VALUES ('c', 'c', 'FUNCTION', 'TABLE');",
            )
            .unwrap();

        assert_eq!(
            migration.status().unwrap(),
            CatalogStatus {
                table_exists: true,
                routine_count: 3,
                procedure_count: 1,
                function_count: 2,
            }
        );
    }

    #[test]
    fn test_down_removes_table_and_is_idempotent() {
        let mut migration = migration();
        migration.up().unwrap();
        migration.down().unwrap();
        migration.down().unwrap();
        assert!(!migration.status().unwrap().table_exists);
    }

    #[test]
    fn test_prefixes_are_isolated() {
        let conn = Connection::open_in_memory().unwrap();
        let mut first = CatalogMigration::new(conn, "a_").unwrap();
        first.up().unwrap();

        let second = CatalogMigration::new(first.into_connection(), "b_").unwrap();
        assert!(!second.status().unwrap().table_exists);
    }
}
