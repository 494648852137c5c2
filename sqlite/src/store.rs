//! Registration of routines in the SQLite catalog table.
//!
//! SQLite has no stored procedures or user-defined SQL functions, so the
//! catalog is populated explicitly. Each entry records the
//! `ROUTINE_TYPE`/`DATA_TYPE` pair the catalog query classifies.

use routine_sync_core::{Routine, RoutineKind};
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::debug;

use crate::error::{Result, SqliteError};
use crate::schema::{routines_table, validate_prefix};

/// Schema used when an entry does not name one.
pub const DEFAULT_SCHEMA: &str = "main";

/// One row of the catalog table.
///
/// # Examples
///
/// ```
/// use routine_sync_core::RoutineKind;
/// use routine_sync_sqlite::CatalogEntry;
///
/// let entry = CatalogEntry::new("dbo", "GetUsers", RoutineKind::Procedure, "CREATE PROCEDURE ...");
/// assert_eq!(entry.routine_type, "PROCEDURE");
/// assert_eq!(entry.kind(), Some(RoutineKind::Procedure));
///
/// let table = CatalogEntry::new("dbo", "Lines", RoutineKind::TableFunction, "")
///     .with_data_type(Some("TABLE"));
/// assert_eq!(table.kind(), Some(RoutineKind::TableFunction));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub schema: String,
    pub name: String,
    pub routine_type: String,
    pub data_type: Option<String>,
    pub definition: String,
}

impl CatalogEntry {
    /// Builds an entry whose type columns classify back to `kind`.
    pub fn new(
        schema: impl Into<String>,
        name: impl Into<String>,
        kind: RoutineKind,
        definition: impl Into<String>,
    ) -> Self {
        let (routine_type, data_type) = kind.catalog_types();
        Self {
            schema: schema.into(),
            name: name.into(),
            routine_type: routine_type.to_string(),
            data_type: data_type.map(String::from),
            definition: definition.into(),
        }
    }

    /// Overrides the `DATA_TYPE` column, e.g. with a scalar function's
    /// return type.
    pub fn with_data_type(mut self, data_type: Option<&str>) -> Self {
        self.data_type = data_type.map(String::from);
        self
    }

    /// Classification the catalog query assigns to this entry.
    pub fn kind(&self) -> Option<RoutineKind> {
        RoutineKind::classify(&self.routine_type, self.data_type.as_deref())
    }

    /// Converts a routine read from another catalog.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::ConversionError`] if the routine has no kind.
    pub fn from_routine(routine: &Routine) -> Result<Self> {
        let kind = routine.kind.ok_or_else(|| {
            SqliteError::ConversionError(format!(
                "routine {} has no kind and cannot be registered",
                routine.qualified_name()
            ))
        })?;
        Ok(Self::new(
            &routine.schema,
            &routine.name,
            kind,
            &routine.definition,
        ))
    }
}

/// Whether [`RoutineStore::register`] created or replaced an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Registration {
    Inserted,
    Updated,
}

/// Reads and writes entries of the `{prefix}routines` table.
pub struct RoutineStore {
    conn: Connection,
    table: String,
}

impl RoutineStore {
    /// # Errors
    ///
    /// Returns [`SqliteError::InvalidPrefix`] if the prefix contains invalid characters.
    pub fn new(conn: Connection, prefix: &str) -> Result<Self> {
        validate_prefix(prefix)?;
        Ok(Self {
            conn,
            table: routines_table(prefix),
        })
    }

    /// Inserts or replaces the entry keyed by `(schema, name)`.
    ///
    /// On replacement `CREATED` is kept and `LAST_ALTERED` is refreshed.
    pub fn register(&mut self, entry: &CatalogEntry) -> Result<Registration> {
        let schema = schema_or_default(&entry.schema);
        let tx = self.conn.transaction()?;

        let existing: Option<i64> = tx
            .query_row(
                &format!(
                    "SELECT id FROM {} WHERE SPECIFIC_SCHEMA = ?1 AND SPECIFIC_NAME = ?2",
                    self.table
                ),
                params![schema, entry.name],
                |row| row.get(0),
            )
            .optional()?;

        let registration = match existing {
            Some(id) => {
                tx.execute(
                    &format!(
                        "UPDATE {} SET ROUTINE_TYPE = ?1, DATA_TYPE = ?2, ROUTINE_DEFINITION = ?3, \
                         LAST_ALTERED = datetime('now') WHERE id = ?4",
                        self.table
                    ),
                    params![entry.routine_type, entry.data_type, entry.definition, id],
                )?;
                Registration::Updated
            }
            None => {
                tx.execute(
                    &format!(
                        "INSERT INTO {} (SPECIFIC_SCHEMA, SPECIFIC_NAME, ROUTINE_NAME, ROUTINE_TYPE, \
                         DATA_TYPE, ROUTINE_DEFINITION) VALUES (?1, ?2, ?2, ?3, ?4, ?5)",
                        self.table
                    ),
                    params![
                        schema,
                        entry.name,
                        entry.routine_type,
                        entry.data_type,
                        entry.definition
                    ],
                )?;
                Registration::Inserted
            }
        };

        tx.commit()?;
        debug!(schema, name = %entry.name, ?registration, "Registered routine");
        Ok(registration)
    }

    /// Removes the entry keyed by `(schema, name)`.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteError::RoutineNotFound`] if no entry matches.
    pub fn remove(&mut self, schema: &str, name: &str) -> Result<()> {
        let schema = schema_or_default(schema);
        let removed = self.conn.execute(
            &format!(
                "DELETE FROM {} WHERE SPECIFIC_SCHEMA = ?1 AND SPECIFIC_NAME = ?2",
                self.table
            ),
            params![schema, name],
        )?;
        if removed == 0 {
            return Err(SqliteError::RoutineNotFound(format!("[{schema}].[{name}]")));
        }
        Ok(())
    }

    /// Looks up one entry.
    pub fn get(&self, schema: &str, name: &str) -> Result<Option<CatalogEntry>> {
        let schema = schema_or_default(schema);
        let entry = self
            .conn
            .query_row(
                &format!(
                    "SELECT SPECIFIC_SCHEMA, SPECIFIC_NAME, ROUTINE_TYPE, DATA_TYPE, \
                     COALESCE(ROUTINE_DEFINITION, '') FROM {} \
                     WHERE SPECIFIC_SCHEMA = ?1 AND SPECIFIC_NAME = ?2",
                    self.table
                ),
                params![schema, name],
                |row| {
                    Ok(CatalogEntry {
                        schema: row.get(0)?,
                        name: row.get(1)?,
                        routine_type: row.get(2)?,
                        data_type: row.get(3)?,
                        definition: row.get(4)?,
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    /// Number of entries in the table.
    pub fn count(&self) -> Result<usize> {
        let count: i64 =
            self.conn
                .query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }

    pub fn into_connection(self) -> Connection {
        self.conn
    }
}

fn schema_or_default(schema: &str) -> &str {
    if schema.trim().is_empty() {
        DEFAULT_SCHEMA
    } else {
        schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CatalogMigration;
    use chrono::NaiveDateTime;

    fn store() -> RoutineStore {
        let mut migration =
            CatalogMigration::new(Connection::open_in_memory().unwrap(), "t_").unwrap();
        migration.up().unwrap();
        RoutineStore::new(migration.into_connection(), "t_").unwrap()
    }

    #[test]
    fn test_register_then_update() {
        let mut store = store();
        let entry = CatalogEntry::new("dbo", "GetUsers", RoutineKind::Procedure, "v1");
        assert_eq!(store.register(&entry).unwrap(), Registration::Inserted);

        let changed = CatalogEntry {
            definition: "v2".into(),
            ..entry
        };
        assert_eq!(store.register(&changed).unwrap(), Registration::Updated);
        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(
            store.get("dbo", "GetUsers").unwrap().unwrap().definition,
            "v2"
        );
    }

    #[test]
    fn test_blank_schema_uses_default() {
        let mut store = store();
        store
            .register(&CatalogEntry::new("", "Total", RoutineKind::ScalarFunction, ""))
            .unwrap();
        let entry = store.get(DEFAULT_SCHEMA, "Total").unwrap().unwrap();
        assert_eq!(entry.schema, DEFAULT_SCHEMA);
        assert_eq!(entry.kind(), Some(RoutineKind::ScalarFunction));
    }

    #[test]
    fn test_remove_missing_routine() {
        let mut store = store();
        assert!(matches!(
            store.remove("dbo", "Nope"),
            Err(SqliteError::RoutineNotFound(name)) if name == "[dbo].[Nope]"
        ));
    }

    #[test]
    fn test_remove_existing_routine() {
        let mut store = store();
        store
            .register(&CatalogEntry::new("dbo", "Gone", RoutineKind::Procedure, ""))
            .unwrap();
        store.remove("dbo", "Gone").unwrap();
        assert!(store.get("dbo", "Gone").unwrap().is_none());
    }

    #[test]
    fn test_from_routine_requires_kind() {
        let routine = Routine {
            schema: "dbo".into(),
            name: "Odd".into(),
            kind: None,
            definition: String::new(),
            created: NaiveDateTime::default(),
            modified: NaiveDateTime::default(),
        };
        assert!(matches!(
            CatalogEntry::from_routine(&routine),
            Err(SqliteError::ConversionError(_))
        ));

        let routine = Routine {
            kind: Some(RoutineKind::TableFunction),
            ..routine
        };
        let entry = CatalogEntry::from_routine(&routine).unwrap();
        assert_eq!(entry.data_type.as_deref(), Some("TABLE"));
    }

    #[test]
    fn test_register_requires_catalog_table() {
        let mut store = RoutineStore::new(Connection::open_in_memory().unwrap(), "t_").unwrap();
        let entry = CatalogEntry::new("dbo", "x", RoutineKind::Procedure, "");
        assert!(matches!(
            store.register(&entry),
            Err(SqliteError::DatabaseError(_))
        ));
    }
}
