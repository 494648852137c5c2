//! Core types for generic SQL execution and routine materialization.
//!
//! This crate defines the shapes shared by every layer of routine-sync and
//! performs no I/O:
//!
//! - [`Outcome`]: success/message/error envelope whose success flag is
//!   derived from its payload.
//! - [`Value`], [`Cell`], [`Row`]: untyped result rows with typed-on-read
//!   access through [`FromValue`].
//! - [`Routine`], [`RoutineKind`]: user-defined routines read from a schema
//!   catalog.
//! - [`Parameter`], [`CommandKind`]: command inputs.
//!
//! # Example
//!
//! ```
//! use routine_sync_core::*;
//!
//! let row = Row::new(0, vec![
//!     Cell::new(0, "routine_name", Value::from("GetUsers")),
//!     Cell::new(1, "kind", Value::from(0)),
//! ]);
//!
//! let name: String = row.get("routine_name");
//! let kind: Option<RoutineKind> = row.get("kind");
//! assert_eq!(name, "GetUsers");
//! assert_eq!(kind, Some(RoutineKind::Procedure));
//!
//! let rows: Outcome<Vec<Row>> = Outcome::collection(vec![row]);
//! assert!(rows.success());
//! ```

mod command;
mod outcome;
mod routine;
mod row;
mod value;

pub use command::{CommandKind, Parameter};
pub use outcome::{BoxError, Outcome};
pub use routine::{ParseKindError, Routine, RoutineKind};
pub use row::{Cell, Row};
pub use value::{FromValue, Value, parse_timestamp};
