//! Routine catalog reader.
//!
//! Runs one fixed introspection query through the [`Executor`] and projects
//! each result row into a [`Routine`] by column name. The classification
//! ordinal is computed by the query itself; the reader only maps it back
//! with [`RoutineKind::from_ordinal`].

use std::time::Duration;

use chrono::NaiveDateTime;
use routine_sync_core::{Outcome, Routine, RoutineKind, Row};

use crate::error::ExecuteError;
use crate::executor::{Connector, DEFAULT_TIMEOUT, Executor, Request};

/// Introspection query for repositories exposing `INFORMATION_SCHEMA.ROUTINES`.
///
/// Every catalog query must produce the same column aliases:
/// `routine_schema`, `routine_name`, `kind`, `definition`, `sub_type`,
/// `created` and `modified`.
pub const INFORMATION_SCHEMA_ROUTINES_SQL: &str = "\
SELECT
    SPECIFIC_SCHEMA AS routine_schema,
    SPECIFIC_NAME AS routine_name,
    (CASE WHEN ROUTINE_TYPE = N'PROCEDURE'
          THEN 0
          WHEN ROUTINE_TYPE = N'FUNCTION' AND DATA_TYPE <> N'TABLE'
          THEN 1
          WHEN ROUTINE_TYPE = N'FUNCTION' AND DATA_TYPE = N'TABLE'
          THEN 2
     END) AS kind,
    ROUTINE_DEFINITION AS definition,
    DATA_TYPE AS sub_type,
    CREATED AS created,
    LAST_ALTERED AS modified
FROM INFORMATION_SCHEMA.ROUTINES
WHERE LOWER(LEFT(ROUTINE_NAME, 3)) NOT IN ('sp_', 'xp_', 'ms_')";

/// Reads the user-defined routines of one repository.
#[derive(Debug, Clone)]
pub struct RoutineCatalog<C> {
    executor: Executor<C>,
    query: String,
    timeout: Duration,
}

impl<C: Connector> RoutineCatalog<C> {
    /// Creates a reader that runs `query` against `connector`.
    pub fn new(connector: C, query: impl Into<String>) -> Self {
        Self {
            executor: Executor::new(connector),
            query: query.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a reader using [`INFORMATION_SCHEMA_ROUTINES_SQL`].
    pub fn information_schema(connector: C) -> Self {
        Self::new(connector, INFORMATION_SCHEMA_ROUTINES_SQL)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn executor(&self) -> &Executor<C> {
        &self.executor
    }

    /// Runs the catalog query, keeping the outcome so callers can tell an
    /// empty catalog from an unreachable one.
    pub fn fetch(&self) -> Outcome<Vec<Routine>, ExecuteError> {
        let request = Request::new(self.query.as_str()).with_timeout(self.timeout);
        self.executor
            .execute(&request)
            .map(|rows| rows.iter().map(routine_from_row).collect())
    }

    /// Every user-defined routine in catalog order. Any unsuccessful fetch,
    /// including an empty one, yields an empty vector.
    pub fn list_routines(&self) -> Vec<Routine> {
        self.fetch().into_items()
    }
}

/// Projects one catalog row into a [`Routine`].
///
/// Missing or mistyped columns fall back to the field's zero value: an empty
/// string, the epoch timestamp, or an unmapped kind.
pub fn routine_from_row(row: &Row) -> Routine {
    Routine {
        schema: row.get("routine_schema"),
        name: row.get("routine_name"),
        kind: row.get::<Option<RoutineKind>>("kind"),
        definition: row.get("definition"),
        created: row.get::<NaiveDateTime>("created"),
        modified: row.get::<NaiveDateTime>("modified"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{Failure, ScriptedConnector};
    use routine_sync_core::Value;

    const COLUMNS: &[&str] = &[
        "routine_schema",
        "routine_name",
        "kind",
        "definition",
        "sub_type",
        "created",
        "modified",
    ];

    fn catalog_row(name: &str, kind: Value) -> Vec<Value> {
        vec![
            Value::from("dbo"),
            Value::from(name),
            kind,
            Value::from(format!("CREATE PROCEDURE {name} AS SELECT 1")),
            Value::Null,
            Value::from("2024-01-02 03:04:05"),
            Value::from("2024-02-03 04:05:06.250"),
        ]
    }

    #[test]
    fn test_rows_project_into_routines() {
        let connector = ScriptedConnector::new(
            COLUMNS,
            vec![
                catalog_row("GetUsers", Value::Integer(0)),
                catalog_row("Total", Value::Integer(1)),
                catalog_row("Orders", Value::Integer(2)),
            ],
        );
        let routines = RoutineCatalog::information_schema(connector).list_routines();

        assert_eq!(routines.len(), 3);
        assert_eq!(routines[0].qualified_name(), "[dbo].[GetUsers]");
        assert_eq!(routines[0].kind, Some(RoutineKind::Procedure));
        assert_eq!(routines[1].kind, Some(RoutineKind::ScalarFunction));
        assert_eq!(routines[2].kind, Some(RoutineKind::TableFunction));
        assert_eq!(
            routines[0].created.format("%Y-%m-%d %H:%M:%S").to_string(),
            "2024-01-02 03:04:05"
        );
        assert_eq!(
            routines[0].definition,
            "CREATE PROCEDURE GetUsers AS SELECT 1"
        );
    }

    #[test]
    fn test_unknown_or_null_kind_is_unmapped() {
        let connector = ScriptedConnector::new(
            COLUMNS,
            vec![
                catalog_row("Odd", Value::Integer(5)),
                catalog_row("Untyped", Value::Null),
            ],
        );
        let routines = RoutineCatalog::information_schema(connector).list_routines();
        assert!(routines.iter().all(|r| r.kind.is_none()));
    }

    #[test]
    fn test_missing_columns_yield_zero_values() {
        let connector =
            ScriptedConnector::new(&["routine_name"], vec![vec![Value::from("Lonely")]]);
        let routines = RoutineCatalog::new(connector, "SELECT 'Lonely' AS routine_name")
            .list_routines();

        assert_eq!(routines[0].name, "Lonely");
        assert_eq!(routines[0].schema, "");
        assert_eq!(routines[0].definition, "");
        assert_eq!(routines[0].kind, None);
        assert_eq!(routines[0].created, NaiveDateTime::default());
    }

    #[test]
    fn test_failures_yield_empty_list() {
        for failure in [Failure::Connect, Failure::Run] {
            let catalog = RoutineCatalog::information_schema(ScriptedConnector::failing(failure));
            assert!(catalog.list_routines().is_empty());
            assert!(catalog.fetch().error().is_some());
        }

        let empty = RoutineCatalog::information_schema(ScriptedConnector::new(COLUMNS, vec![]));
        assert!(empty.list_routines().is_empty());
        assert!(empty.fetch().is_empty());
    }

    #[test]
    fn test_timeout_is_forwarded() {
        let connector = ScriptedConnector::new(COLUMNS, vec![]);
        let calls = connector.calls();
        RoutineCatalog::information_schema(connector)
            .with_timeout(Duration::from_secs(3))
            .list_routines();

        let calls = calls.borrow();
        assert_eq!(calls.requests[0].timeout(), Duration::from_secs(3));
        assert_eq!(calls.requests[0].text(), INFORMATION_SCHEMA_ROUTINES_SQL);
    }

    #[test]
    fn test_query_excludes_system_prefixes() {
        for prefix in ["'sp_'", "'xp_'", "'ms_'"] {
            assert!(INFORMATION_SCHEMA_ROUTINES_SQL.contains(prefix));
        }
    }
}
