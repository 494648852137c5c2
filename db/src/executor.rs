//! Generic SQL command execution.
//!
//! The [`Executor`] knows nothing about the shape of a result set. It opens
//! one connection through a [`Connector`], runs one command, and collects
//! every row the driver streams into a [`RowSink`]. Expected failures never
//! propagate: they come back as an [`Outcome`].

use std::time::Duration;

use routine_sync_core::{Cell, CommandKind, Outcome, Parameter, Row, Value};
use tracing::{debug, warn};

use crate::error::ExecuteError;

/// Default per-command deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MSG_INVALID_COMMAND: &str = "The SQL command text is not valid.";
const MSG_NO_RESULTS: &str = "The command completed without returning any results.";

/// Opens connections to a repository.
pub trait Connector {
    type Session: Session;

    /// Opens a new connection. Each call returns an independent session.
    fn connect(&self) -> Result<Self::Session, ExecuteError>;
}

/// One open connection, owned by a single [`Executor::execute`] call.
///
/// Dropping a session must release the connection. [`close`](Session::close)
/// is the explicit path used after a successful read so close errors can be
/// observed.
pub trait Session {
    /// Runs `request` and streams its result set into `sink`.
    ///
    /// Implementations call [`RowSink::begin`] once with the column names
    /// and then [`RowSink::push`] once per row. Values must already be
    /// normalized: SQL NULL is [`Value::Null`].
    fn run(&mut self, request: &Request, sink: &mut RowSink) -> Result<(), ExecuteError>;

    fn close(self) -> Result<(), ExecuteError>
    where
        Self: Sized;
}

/// Collects streamed rows, assigning row indexes and column names.
#[derive(Debug, Default)]
pub struct RowSink {
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl RowSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the column names of the result set.
    pub fn begin(&mut self, columns: Vec<String>) {
        self.columns = columns;
    }

    /// Appends one row. Values beyond the declared columns get an empty name.
    pub fn push(&mut self, values: Vec<Value>) {
        let cells = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let name = self.columns.get(index).cloned().unwrap_or_default();
                Cell::new(index, name, value)
            })
            .collect();
        self.rows.push(Row::new(self.rows.len(), cells));
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

/// A single command: text, bound parameters, kind, and deadline.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use routine_sync_core::{CommandKind, Parameter};
/// use routine_sync_db::Request;
///
/// let request = Request::new("SELECT * FROM users WHERE id = :id")
///     .with_parameter(Parameter::named(":id", 7))
///     .with_timeout(Duration::from_secs(5));
///
/// assert_eq!(request.kind(), CommandKind::Text);
/// assert_eq!(request.parameters().len(), 1);
/// assert_eq!(request.timeout(), Duration::from_secs(5));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    text: String,
    parameters: Vec<Parameter>,
    kind: CommandKind,
    timeout: Duration,
}

impl Request {
    /// A plain SQL text command.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            parameters: Vec::new(),
            kind: CommandKind::Text,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// A stored-procedure invocation by name.
    pub fn procedure(name: impl Into<String>) -> Self {
        Self::new(name).with_kind(CommandKind::StoredProcedure)
    }

    pub fn with_kind(mut self, kind: CommandKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn kind(&self) -> CommandKind {
        self.kind
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Runs commands through a [`Connector`] and wraps the result in an
/// [`Outcome`].
#[derive(Debug, Clone)]
pub struct Executor<C> {
    connector: C,
}

impl<C: Connector> Executor<C> {
    pub fn new(connector: C) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Executes one command and returns every row it produced.
    ///
    /// - Blank text is rejected without opening a connection.
    /// - Zero rows yields an empty outcome, which is unsuccessful but carries
    ///   no error.
    /// - Connection and driver failures yield a failed outcome.
    ///
    /// The connection is closed before returning on every path.
    pub fn execute(&self, request: &Request) -> Outcome<Vec<Row>, ExecuteError> {
        if request.text().trim().is_empty() {
            return Outcome::rejected(MSG_INVALID_COMMAND);
        }

        debug!(
            kind = %request.kind(),
            parameters = request.parameters().len(),
            timeout_secs = request.timeout().as_secs(),
            "Executing command"
        );

        let mut session = match self.connector.connect() {
            Ok(session) => session,
            Err(error) => {
                debug!(%error, "Connection failed");
                return Outcome::failed(error);
            }
        };

        let mut sink = RowSink::new();
        if let Err(error) = session.run(request, &mut sink) {
            debug!(%error, "Command failed");
            return Outcome::failed(error);
        }

        if let Err(error) = session.close() {
            warn!(%error, "Connection did not close cleanly");
        }

        debug!(
            columns = sink.columns().len(),
            rows = sink.len(),
            "Command completed"
        );

        if sink.is_empty() {
            Outcome::empty(MSG_NO_RESULTS)
        } else {
            Outcome::collection(sink.into_rows())
        }
    }

    /// Executes SQL text with the given parameters.
    pub fn query(
        &self,
        text: impl Into<String>,
        parameters: impl IntoIterator<Item = Parameter>,
    ) -> Outcome<Vec<Row>, ExecuteError> {
        self.execute(&Request::new(text).with_parameters(parameters))
    }

    /// Invokes a stored procedure with the given parameters.
    pub fn procedure(
        &self,
        name: impl Into<String>,
        parameters: impl IntoIterator<Item = Parameter>,
    ) -> Outcome<Vec<Row>, ExecuteError> {
        self.execute(&Request::procedure(name).with_parameters(parameters))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted in-memory connector for unit tests.

    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[derive(Debug, Default)]
    pub struct Calls {
        pub connects: usize,
        pub closes: usize,
        pub drops: usize,
        pub requests: Vec<Request>,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Failure {
        None,
        Connect,
        Run,
        /// Streams the first row, then fails.
        Cursor,
        Close,
    }

    /// Replays a fixed result set on every connection.
    #[derive(Debug, Clone)]
    pub struct ScriptedConnector {
        columns: Vec<String>,
        rows: Vec<Vec<Value>>,
        failure: Failure,
        calls: Rc<RefCell<Calls>>,
    }

    impl ScriptedConnector {
        pub fn new(columns: &[&str], rows: Vec<Vec<Value>>) -> Self {
            Self {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                rows,
                failure: Failure::None,
                calls: Rc::default(),
            }
        }

        pub fn failing(failure: Failure) -> Self {
            Self::new(&[], Vec::new()).with_failure(failure)
        }

        pub fn with_failure(mut self, failure: Failure) -> Self {
            self.failure = failure;
            self
        }

        pub fn calls(&self) -> Rc<RefCell<Calls>> {
            Rc::clone(&self.calls)
        }
    }

    pub struct ScriptedSession {
        connector: ScriptedConnector,
    }

    impl Connector for ScriptedConnector {
        type Session = ScriptedSession;

        fn connect(&self) -> Result<ScriptedSession, ExecuteError> {
            self.calls.borrow_mut().connects += 1;
            if self.failure == Failure::Connect {
                return Err(ExecuteError::connect("server unreachable"));
            }
            Ok(ScriptedSession {
                connector: self.clone(),
            })
        }
    }

    impl Session for ScriptedSession {
        fn run(&mut self, request: &Request, sink: &mut RowSink) -> Result<(), ExecuteError> {
            self.connector
                .calls
                .borrow_mut()
                .requests
                .push(request.clone());
            if self.connector.failure == Failure::Run {
                return Err(ExecuteError::driver("syntax error near 'SELEC'"));
            }
            sink.begin(self.connector.columns.clone());
            for row in &self.connector.rows {
                sink.push(row.clone());
                if self.connector.failure == Failure::Cursor {
                    return Err(ExecuteError::driver("cursor reset after first row"));
                }
            }
            Ok(())
        }

        fn close(self) -> Result<(), ExecuteError> {
            self.connector.calls.borrow_mut().closes += 1;
            if self.connector.failure == Failure::Close {
                return Err(ExecuteError::Close("socket reset".into()));
            }
            Ok(())
        }
    }

    impl Drop for ScriptedSession {
        fn drop(&mut self) {
            self.connector.calls.borrow_mut().drops += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{Failure, ScriptedConnector};
    use super::*;

    fn users() -> ScriptedConnector {
        ScriptedConnector::new(
            &["id", "name", "id"],
            vec![
                vec![Value::Integer(1), Value::from("ada"), Value::Integer(10)],
                vec![Value::Integer(2), Value::Null, Value::Integer(20)],
            ],
        )
    }

    #[test]
    fn test_rows_and_columns_match_driver() {
        let executor = Executor::new(users());
        let outcome = executor.query("SELECT * FROM users", []);

        assert!(outcome.success());
        assert_eq!(outcome.message(), "There are 2 items in the list.");
        let rows = outcome.into_items();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].index(), 1);
        assert_eq!(rows[0].len(), 3);
        assert_eq!(
            rows[0].column_names().collect::<Vec<_>>(),
            vec!["id", "name", "id"]
        );
        // Duplicate names resolve to the first column.
        assert_eq!(rows[0].get::<i64>("id"), 1);
        assert_eq!(rows[1].get::<String>("name"), "");
    }

    #[test]
    fn test_blank_text_is_rejected_without_connecting() {
        let connector = users();
        let calls = connector.calls();
        let executor = Executor::new(connector);

        let outcome = executor.query("  \n\t", []);
        assert!(outcome.is_rejected());
        assert!(!outcome.success());
        assert_eq!(outcome.message(), MSG_INVALID_COMMAND);
        assert_eq!(calls.borrow().connects, 0);
    }

    #[test]
    fn test_zero_rows_is_empty_not_failed() {
        let connector = ScriptedConnector::new(&["id"], Vec::new());
        let executor = Executor::new(connector);

        let outcome = executor.query("SELECT id FROM nothing", []);
        assert!(!outcome.success());
        assert!(outcome.is_empty());
        assert!(outcome.error().is_none());
        assert_eq!(outcome.message(), MSG_NO_RESULTS);
    }

    #[test]
    fn test_connect_failure_becomes_failed_outcome() {
        let executor = Executor::new(ScriptedConnector::failing(Failure::Connect));
        let outcome = executor.query("SELECT 1", []);

        assert!(!outcome.success());
        assert!(matches!(outcome.error(), Some(ExecuteError::Connect(_))));
        assert_eq!(
            outcome.message(),
            "An internal error occurred, connection failed: server unreachable."
        );
    }

    #[test]
    fn test_driver_failure_releases_connection() {
        let connector = ScriptedConnector::failing(Failure::Run);
        let calls = connector.calls();
        let executor = Executor::new(connector);

        let outcome = executor.query("SELEC 1", []);
        assert!(matches!(outcome.error(), Some(ExecuteError::Driver(_))));
        let calls = calls.borrow();
        assert_eq!(calls.connects, 1);
        assert_eq!(calls.closes, 0);
        assert_eq!(calls.drops, 1);
    }

    #[test]
    fn test_cursor_failure_discards_partial_rows() {
        let connector = users().with_failure(Failure::Cursor);
        let calls = connector.calls();
        let executor = Executor::new(connector);

        let outcome = executor.query("SELECT * FROM users", []);
        assert!(!outcome.success());
        assert!(matches!(outcome.error(), Some(ExecuteError::Driver(_))));
        assert!(outcome.items().is_empty());
        let calls = calls.borrow();
        assert_eq!(calls.closes, 0);
        assert_eq!(calls.drops, 1);
    }

    #[test]
    fn test_close_failure_keeps_rows() {
        let connector = users().with_failure(Failure::Close);
        let calls = connector.calls();
        let executor = Executor::new(connector);

        let outcome = executor.query("SELECT * FROM users", []);
        assert!(outcome.success());
        assert_eq!(outcome.items().len(), 2);
        assert_eq!(calls.borrow().closes, 1);
        assert_eq!(calls.borrow().drops, 1);
    }

    #[test]
    fn test_success_closes_exactly_once() {
        let connector = users();
        let calls = connector.calls();
        let executor = Executor::new(connector);

        executor.query("SELECT * FROM users", []);
        executor.query("SELECT * FROM users", []);
        let calls = calls.borrow();
        assert_eq!(calls.connects, 2);
        assert_eq!(calls.closes, 2);
    }

    #[test]
    fn test_procedure_forwards_kind_and_parameters() {
        let connector = users();
        let calls = connector.calls();
        let executor = Executor::new(connector);

        executor.procedure("dbo.GetUsers", [Parameter::named("@active", true)]);
        let calls = calls.borrow();
        let request = &calls.requests[0];
        assert_eq!(request.kind(), CommandKind::StoredProcedure);
        assert_eq!(request.text(), "dbo.GetUsers");
        assert_eq!(request.parameters()[0].name(), Some("@active"));
        assert_eq!(request.timeout(), DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_sink_names_extra_values_blank() {
        let mut sink = RowSink::new();
        sink.begin(vec!["a".to_string()]);
        sink.push(vec![Value::Integer(1), Value::Integer(2)]);
        let rows = sink.into_rows();
        assert_eq!(rows[0].at(1).map(|c| c.name()), Some(""));
    }
}
