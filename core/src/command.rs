//! Command kinds and bound parameters.

use std::fmt;

use serde::Serialize;

use crate::value::Value;

/// How the command text is interpreted by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CommandKind {
    /// Plain SQL text, forwarded verbatim.
    #[default]
    Text,
    /// The text is the name of a stored procedure to invoke.
    StoredProcedure,
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Text => f.write_str("text"),
            CommandKind::StoredProcedure => f.write_str("stored procedure"),
        }
    }
}

/// A value bound to a command, by name or by position.
///
/// Names are passed to the driver as given; drivers decide which prefix
/// (`@`, `:`, `$`) they accept.
///
/// # Examples
///
/// ```
/// use routine_sync_core::{Parameter, Value};
///
/// let by_name = Parameter::named("@schema", "dbo");
/// assert_eq!(by_name.name(), Some("@schema"));
///
/// let by_position = Parameter::positional(42);
/// assert_eq!(by_position.value(), &Value::Integer(42));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    name: Option<String>,
    value: Value,
}

impl Parameter {
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            value: value.into(),
        }
    }

    pub fn positional(value: impl Into<Value>) -> Self {
        Self {
            name: None,
            value: value.into(),
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}
