//! Routine records produced by the catalog reader.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::value::{FromValue, Value};

/// Classification of a user-defined routine.
///
/// The discriminants are the ordinals produced by the catalog query and are
/// part of the catalog contract: `0` procedure, `1` scalar function,
/// `2` table function.
///
/// # Examples
///
/// ```
/// use routine_sync_core::RoutineKind;
///
/// assert_eq!(RoutineKind::classify("PROCEDURE", None), Some(RoutineKind::Procedure));
/// assert_eq!(RoutineKind::classify("FUNCTION", Some("int")), Some(RoutineKind::ScalarFunction));
/// assert_eq!(RoutineKind::classify("FUNCTION", Some("TABLE")), Some(RoutineKind::TableFunction));
/// assert_eq!(RoutineKind::from_ordinal(2), Some(RoutineKind::TableFunction));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoutineKind {
    Procedure = 0,
    ScalarFunction = 1,
    TableFunction = 2,
}

impl RoutineKind {
    /// All kinds in ordinal order.
    pub const ALL: [RoutineKind; 3] = [
        RoutineKind::Procedure,
        RoutineKind::ScalarFunction,
        RoutineKind::TableFunction,
    ];

    /// Maps a catalog ordinal back to a kind. Unknown ordinals yield `None`.
    pub fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(RoutineKind::Procedure),
            1 => Some(RoutineKind::ScalarFunction),
            2 => Some(RoutineKind::TableFunction),
            _ => None,
        }
    }

    pub fn ordinal(self) -> i64 {
        self as i64
    }

    /// Client-side mirror of the catalog query's classification.
    ///
    /// `routine_type` is compared exactly, as the catalog's `CASE` does.
    /// A function whose data type is unknown is not classified, matching the
    /// SQL semantics of `NULL <> 'TABLE'`.
    pub fn classify(routine_type: &str, data_type: Option<&str>) -> Option<Self> {
        match (routine_type, data_type) {
            ("PROCEDURE", _) => Some(RoutineKind::Procedure),
            ("FUNCTION", Some("TABLE")) => Some(RoutineKind::TableFunction),
            ("FUNCTION", Some(_)) => Some(RoutineKind::ScalarFunction),
            _ => None,
        }
    }

    /// `(ROUTINE_TYPE, DATA_TYPE)` pair that [`classify`](Self::classify)
    /// maps back to this kind.
    pub fn catalog_types(self) -> (&'static str, Option<&'static str>) {
        match self {
            RoutineKind::Procedure => ("PROCEDURE", None),
            RoutineKind::ScalarFunction => ("FUNCTION", Some("sql_variant")),
            RoutineKind::TableFunction => ("FUNCTION", Some("TABLE")),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            RoutineKind::Procedure => "stored procedure",
            RoutineKind::ScalarFunction => "scalar function",
            RoutineKind::TableFunction => "table function",
        }
    }
}

impl fmt::Display for RoutineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when parsing an unknown routine kind name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown routine kind '{0}': expected procedure, scalar, or table")]
pub struct ParseKindError(pub String);

impl FromStr for RoutineKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "procedure" | "proc" | "0" => Ok(RoutineKind::Procedure),
            "scalar" | "scalar_function" | "1" => Ok(RoutineKind::ScalarFunction),
            "table" | "table_function" | "2" => Ok(RoutineKind::TableFunction),
            _ => Err(ParseKindError(s.to_string())),
        }
    }
}

impl FromValue for RoutineKind {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(RoutineKind::from_ordinal)
    }
}

/// A stored procedure, scalar function, or table function read from the
/// catalog.
///
/// `kind` is `None` when the catalog reported a classification outside the
/// known ordinals; such routines are materialized in the schema root.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Routine {
    pub schema: String,
    pub name: String,
    pub kind: Option<RoutineKind>,
    pub definition: String,
    pub created: NaiveDateTime,
    pub modified: NaiveDateTime,
}

impl Routine {
    /// Bracket-qualified name, e.g. `[dbo].[GetUsers]`.
    pub fn qualified_name(&self) -> String {
        format!("[{}].[{}]", self.schema, self.name)
    }

    /// File stem used when materializing the routine.
    ///
    /// The bracket-qualified form keeps identically named routines from
    /// different schemas apart. Path separators are replaced so the file
    /// always lands in its kind directory.
    pub fn file_stem(&self) -> String {
        self.qualified_name()
            .chars()
            .map(|ch| if matches!(ch, '/' | '\\') { '_' } else { ch })
            .collect()
    }
}
