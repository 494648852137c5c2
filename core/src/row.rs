//! Untyped result rows with named, typed-on-read cell access.
//!
//! A [`Row`] holds the cells of one result row in column order. Rows carry no
//! schema: any query's output can be projected into a caller-defined type by
//! reading columns by name with [`Row::get`].

use serde::Serialize;

use crate::value::{FromValue, Value};

/// One `(column index, column name, value)` triple of a result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    index: usize,
    name: String,
    value: Value,
}

impl Cell {
    pub fn new(index: usize, name: impl Into<String>, value: Value) -> Self {
        Self {
            index,
            name: name.into(),
            value,
        }
    }

    /// Zero-based column ordinal.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Column name as reported by the driver.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// An ordered sequence of cells plus the zero-based row index.
///
/// Column names are not required to be unique. Lookups by name use exact,
/// case-sensitive comparison and return the first matching cell.
///
/// # Examples
///
/// ```
/// use routine_sync_core::{Cell, Row, Value};
///
/// let row = Row::new(0, vec![
///     Cell::new(0, "id", Value::Integer(7)),
///     Cell::new(1, "label", Value::Null),
/// ]);
///
/// assert_eq!(row.get::<i64>("id"), 7);
/// assert_eq!(row.get::<String>("label"), "");
/// assert_eq!(row.get::<i64>("missing"), 0);
/// assert_eq!(row.get::<Option<String>>("label"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Row {
    index: usize,
    cells: Vec<Cell>,
}

impl Row {
    pub fn new(index: usize, cells: Vec<Cell>) -> Self {
        Self { index, cells }
    }

    /// Zero-based position of this row in its result set.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Number of columns in this row.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Returns the first cell named `name`.
    pub fn cell(&self, name: &str) -> Option<&Cell> {
        self.cells.iter().find(|cell| cell.name == name)
    }

    /// Returns the cell at column ordinal `index`.
    pub fn at(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Decodes the first cell named `name`, or `None` if the column is
    /// missing or its value does not decode as `T`.
    pub fn try_get<T: FromValue>(&self, name: &str) -> Option<T> {
        self.cell(name).and_then(|cell| T::from_value(&cell.value))
    }

    /// Decodes the first cell named `name`, falling back to `T::default()`
    /// when the row is empty, the column is missing, the value is `NULL`, or
    /// the value has a different type.
    pub fn get<T: FromValue + Default>(&self, name: &str) -> T {
        self.try_get(name).unwrap_or_default()
    }

    /// Column names in ordinal order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.cells.iter().map(|cell| cell.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn sample() -> Row {
        Row::new(
            3,
            vec![
                Cell::new(0, "name", Value::Text("first".into())),
                Cell::new(1, "count", Value::Integer(12)),
                Cell::new(2, "name", Value::Text("second".into())),
                Cell::new(3, "created", Value::Text("2023-05-01 10:00:00".into())),
                Cell::new(4, "note", Value::Null),
            ],
        )
    }

    #[test]
    fn test_first_match_wins() {
        assert_eq!(sample().get::<String>("name"), "first");
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let row = sample();
        assert!(row.cell("Name").is_none());
        assert_eq!(row.get::<String>("Name"), "");
    }

    #[test]
    fn test_null_and_missing_yield_zero_values() {
        let row = sample();
        assert_eq!(row.get::<String>("note"), "");
        assert_eq!(row.get::<i64>("note"), 0);
        assert!(!row.get::<bool>("absent"));
        assert_eq!(row.get::<NaiveDateTime>("absent"), NaiveDateTime::default());
    }

    #[test]
    fn test_type_mismatch_yields_zero_value() {
        assert_eq!(sample().get::<i64>("name"), 0);
        assert_eq!(sample().get::<String>("count"), "");
    }

    #[test]
    fn test_empty_row_yields_zero_values() {
        let row = Row::default();
        assert!(row.is_empty());
        assert_eq!(row.get::<String>("anything"), "");
        assert_eq!(row.try_get::<i64>("anything"), None);
    }

    #[test]
    fn test_timestamp_text_is_decoded() {
        let created: NaiveDateTime = sample().get("created");
        assert_eq!(created.to_string(), "2023-05-01 10:00:00");
    }

    #[test]
    fn test_positional_access() {
        let row = sample();
        assert_eq!(row.index(), 3);
        assert_eq!(row.len(), 5);
        assert_eq!(row.at(1).map(Cell::name), Some("count"));
        assert!(row.at(9).is_none());
        assert_eq!(
            row.column_names().collect::<Vec<_>>(),
            ["name", "count", "name", "created", "note"]
        );
    }
}
