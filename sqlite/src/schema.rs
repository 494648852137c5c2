//! SQL generation for the routine catalog table.
//!
//! SQLite has no `INFORMATION_SCHEMA`, so the backend keeps its own catalog
//! table, `{prefix}routines`, whose columns use the `INFORMATION_SCHEMA.ROUTINES`
//! names. The catalog query over it produces the same column aliases and
//! classification ordinals as
//! [`INFORMATION_SCHEMA_ROUTINES_SQL`](routine_sync_db::INFORMATION_SCHEMA_ROUTINES_SQL).
//!
//! Prefixes must contain only alphanumeric characters and underscores, so
//! several isolated catalogs can share one database file.

use crate::error::{Result, SqliteError};

/// Validates that a table prefix contains only alphanumeric characters and underscores.
pub(crate) fn validate_prefix(prefix: &str) -> Result<()> {
    if prefix.is_empty() || !prefix.chars().all(|c| c.is_alphanumeric() || c == '_') {
        return Err(SqliteError::InvalidPrefix(prefix.to_string()));
    }
    Ok(())
}

/// Generates the `CREATE TABLE` and `CREATE INDEX` statements of the catalog.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is empty or contains
/// characters other than alphanumerics and underscores.
pub fn generate_schema_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    Ok(format!(
        r#"
CREATE TABLE IF NOT EXISTS {prefix}routines (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    SPECIFIC_SCHEMA TEXT NOT NULL DEFAULT 'main',
    SPECIFIC_NAME TEXT NOT NULL,
    ROUTINE_NAME TEXT NOT NULL,
    ROUTINE_TYPE TEXT NOT NULL CHECK (ROUTINE_TYPE IN ('PROCEDURE', 'FUNCTION')),
    DATA_TYPE TEXT,
    ROUTINE_DEFINITION TEXT,
    CREATED TEXT NOT NULL DEFAULT (datetime('now')),
    LAST_ALTERED TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE (SPECIFIC_SCHEMA, SPECIFIC_NAME)
);

CREATE INDEX IF NOT EXISTS idx_{prefix}routines_type ON {prefix}routines(ROUTINE_TYPE);
"#
    ))
}

/// Generates SQL to drop the catalog table.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
pub fn generate_drop_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;
    Ok(format!("DROP TABLE IF EXISTS {prefix}routines;\n"))
}

/// Generates the catalog query over `{prefix}routines`.
///
/// Routines whose name starts with `sp_`, `xp_` or `ms_` (any case) are
/// excluded. Rows come back in registration order.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`] if the prefix is invalid.
pub fn routine_catalog_sql(prefix: &str) -> Result<String> {
    validate_prefix(prefix)?;

    Ok(format!(
        r#"
SELECT
    SPECIFIC_SCHEMA AS routine_schema,
    SPECIFIC_NAME AS routine_name,
    (CASE WHEN ROUTINE_TYPE = 'PROCEDURE'
          THEN 0
          WHEN ROUTINE_TYPE = 'FUNCTION' AND DATA_TYPE <> 'TABLE'
          THEN 1
          WHEN ROUTINE_TYPE = 'FUNCTION' AND DATA_TYPE = 'TABLE'
          THEN 2
     END) AS kind,
    ROUTINE_DEFINITION AS definition,
    DATA_TYPE AS sub_type,
    CREATED AS created,
    LAST_ALTERED AS modified
FROM {prefix}routines
WHERE lower(substr(ROUTINE_NAME, 1, 3)) NOT IN ('sp_', 'xp_', 'ms_')
ORDER BY id
"#
    ))
}

/// Full name of the catalog table for `prefix`.
pub(crate) fn routines_table(prefix: &str) -> String {
    format!("{prefix}routines")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_valid_prefix() {
        assert!(validate_prefix("information_schema_").is_ok());
        assert!(validate_prefix("test123").is_ok());
        assert!(validate_prefix("A_B_C").is_ok());
    }

    #[test]
    fn test_invalid_prefixes() {
        assert!(validate_prefix("").is_err());
        assert!(validate_prefix("drop;--").is_err());
        assert!(validate_prefix("hello world").is_err());
        assert!(generate_schema_sql("a-b").is_err());
        assert!(generate_drop_sql("").is_err());
        assert!(routine_catalog_sql("x.y").is_err());
    }

    #[test]
    fn test_generated_sql_uses_prefix() {
        assert!(generate_schema_sql("rs_").unwrap().contains("rs_routines"));
        assert!(generate_schema_sql("rs_").unwrap().contains("idx_rs_routines_type"));
        assert!(
            generate_drop_sql("rs_")
                .unwrap()
                .contains("DROP TABLE IF EXISTS rs_routines")
        );
        assert!(routine_catalog_sql("rs_").unwrap().contains("FROM rs_routines"));
    }

    fn catalog() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(&generate_schema_sql("t_").unwrap()).unwrap();
        conn
    }

    fn insert(conn: &Connection, name: &str, routine_type: &str, data_type: Option<&str>) {
        conn.execute(
            "INSERT INTO t_routines (SPECIFIC_NAME, ROUTINE_NAME, ROUTINE_TYPE, DATA_TYPE) \
             VALUES (?1, ?1, ?2, ?3)",
            rusqlite::params![name, routine_type, data_type],
        )
        .unwrap();
    }

    fn kinds(conn: &Connection) -> Vec<(String, Option<i64>)> {
        let sql = routine_catalog_sql("t_").unwrap();
        let mut stmt = conn.prepare(&sql).unwrap();
        stmt.query_map([], |row| Ok((row.get(1)?, row.get(2)?)))
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
    }

    #[test]
    fn test_catalog_query_classifies_routines() {
        let conn = catalog();
        insert(&conn, "GetUsers", "PROCEDURE", None);
        insert(&conn, "Total", "FUNCTION", Some("int"));
        insert(&conn, "Lines", "FUNCTION", Some("TABLE"));
        insert(&conn, "Untyped", "FUNCTION", None);

        assert_eq!(
            kinds(&conn),
            vec![
                ("GetUsers".to_string(), Some(0)),
                ("Total".to_string(), Some(1)),
                ("Lines".to_string(), Some(2)),
                ("Untyped".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_catalog_query_excludes_system_routines() {
        let conn = catalog();
        insert(&conn, "sp_helptext", "PROCEDURE", None);
        insert(&conn, "XP_cmdshell", "PROCEDURE", None);
        insert(&conn, "ms_foo", "FUNCTION", Some("int"));
        insert(&conn, "spare", "PROCEDURE", None);

        let names: Vec<String> = kinds(&conn).into_iter().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["spare"]);
    }

    #[test]
    fn test_routine_type_is_constrained() {
        let conn = catalog();
        let result = conn.execute(
            "INSERT INTO t_routines (SPECIFIC_NAME, ROUTINE_NAME, ROUTINE_TYPE) VALUES ('v', 'v', 'VIEW')",
            [],
        );
        assert!(result.is_err());
    }
}
