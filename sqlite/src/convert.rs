//! Conversion between [`Value`] and SQLite storage values.
//!
//! SQLite has five storage classes. Reading maps each one to exactly one
//! [`Value`] variant; timestamps stay text and are decoded lazily by
//! [`FromValue`](routine_sync_core::FromValue). Writing maps booleans to
//! `0`/`1` and timestamps to `YYYY-MM-DD HH:MM:SS[.fff]` text, the format
//! produced by `datetime()`.

use routine_sync_core::Value;
use rusqlite::types::{Value as SqlValue, ValueRef};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Normalizes a borrowed SQLite value. SQL NULL becomes [`Value::Null`];
/// text that is not valid UTF-8 is replaced lossily.
pub(crate) fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Value::Bytes(bytes.to_vec()),
    }
}

/// Converts a parameter value into an owned SQLite value for binding.
pub(crate) fn value_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Integer(i) => SqlValue::Integer(*i),
        Value::Float(f) => SqlValue::Real(*f),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Timestamp(ts) => SqlValue::Text(ts.format(TIMESTAMP_FORMAT).to_string()),
        Value::Bytes(bytes) => SqlValue::Blob(bytes.clone()),
    }
}
