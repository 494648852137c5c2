//! rusqlite-backed [`Connector`].
//!
//! Each [`connect`](Connector::connect) opens a fresh connection to an
//! existing database file; missing files are an error rather than being
//! created. Commands run with the request's timeout both as the busy timeout
//! and as a hard deadline: a watchdog thread interrupts the connection when
//! the deadline passes.

use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use routine_sync_core::{CommandKind, Parameter};
use routine_sync_db::{
    Connector, ContextConfig, ExecuteError, Request, RoutineCatalog, RowSink, Session,
    Synchronizer,
};
use rusqlite::{Connection, ErrorCode, InterruptHandle, OpenFlags, Statement};
use tracing::debug;

use crate::convert::{value_from_ref, value_to_sql};
use crate::error::Result;
use crate::schema::routine_catalog_sql;

const PARAMETER_PREFIXES: [char; 3] = [':', '@', '$'];

/// Largest busy timeout SQLite accepts (milliseconds as a C `int`).
const MAX_BUSY_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// Opens SQLite connections to one database file.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use routine_sync_sqlite::SqliteConnector;
///
/// let connector = SqliteConnector::from_connection_string("Data Source=app.db;Version=3");
/// assert_eq!(connector.path(), Path::new("app.db"));
///
/// let connector = SqliteConnector::from_connection_string("sqlite://data/catalog.db");
/// assert_eq!(connector.path(), Path::new("data/catalog.db"));
/// ```
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    flags: OpenFlags,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            flags: OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        }
    }

    /// Accepts `sqlite:<path>`, `sqlite://<path>`, `Data Source=<path>;...`
    /// (also `DataSource` or `Filename`), or a bare path.
    pub fn from_connection_string(connection_string: &str) -> Self {
        Self::new(parse_connection_string(connection_string))
    }

    /// Replaces the open flags, e.g. to open read-only.
    pub fn with_flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_connection_string(connection_string: &str) -> PathBuf {
    let trimmed = connection_string.trim();
    if let Some(rest) = trimmed.strip_prefix("sqlite://") {
        return PathBuf::from(rest);
    }
    if let Some(rest) = trimmed.strip_prefix("sqlite:") {
        return PathBuf::from(rest);
    }
    if trimmed.contains('=') {
        let source = trimmed.split(';').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = key.trim();
            ["data source", "datasource", "filename"]
                .iter()
                .any(|k| key.eq_ignore_ascii_case(k))
                .then(|| value.trim())
        });
        if let Some(source) = source {
            return PathBuf::from(source);
        }
    }
    PathBuf::from(trimmed)
}

impl Connector for SqliteConnector {
    type Session = SqliteSession;

    fn connect(&self) -> std::result::Result<SqliteSession, ExecuteError> {
        debug!(path = %self.path.display(), "Opening SQLite connection");
        let conn = Connection::open_with_flags(&self.path, self.flags)
            .map_err(ExecuteError::connect)?;
        Ok(SqliteSession { conn })
    }
}

/// One open SQLite connection. Dropping it closes the connection.
pub struct SqliteSession {
    conn: Connection,
}

impl Session for SqliteSession {
    fn run(
        &mut self,
        request: &Request,
        sink: &mut RowSink,
    ) -> std::result::Result<(), ExecuteError> {
        if request.kind() == CommandKind::StoredProcedure {
            return Err(ExecuteError::Unsupported(request.kind()));
        }

        let timeout = request.timeout();
        self.conn
            .busy_timeout(timeout.min(MAX_BUSY_TIMEOUT))
            .map_err(ExecuteError::driver)?;

        let watchdog = (!timeout.is_zero())
            .then(|| Watchdog::arm(self.conn.get_interrupt_handle(), timeout));
        let result = stream(&self.conn, request, sink);
        let expired = watchdog.is_some_and(Watchdog::disarm);

        match result {
            Err(error) if expired && is_interrupt(&error) => Err(ExecuteError::Timeout(timeout)),
            other => other,
        }
    }

    fn close(self) -> std::result::Result<(), ExecuteError> {
        self.conn
            .close()
            .map_err(|(_, error)| ExecuteError::Close(Box::new(error)))
    }
}

fn stream(
    conn: &Connection,
    request: &Request,
    sink: &mut RowSink,
) -> std::result::Result<(), ExecuteError> {
    let mut statement = conn.prepare(request.text()).map_err(ExecuteError::driver)?;
    let columns: Vec<String> = statement
        .column_names()
        .into_iter()
        .map(String::from)
        .collect();
    let column_count = columns.len();

    bind(&mut statement, request.parameters())?;
    sink.begin(columns);

    let mut rows = statement.raw_query();
    while let Some(row) = rows.next().map_err(ExecuteError::driver)? {
        let values = (0..column_count)
            .map(|index| row.get_ref(index).map(value_from_ref))
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(ExecuteError::driver)?;
        sink.push(values);
    }
    Ok(())
}

/// Binds named parameters by name, trying each accepted prefix, and
/// unnamed parameters by position in the order given.
fn bind(
    statement: &mut Statement<'_>,
    parameters: &[Parameter],
) -> std::result::Result<(), ExecuteError> {
    let mut position = 0;
    for parameter in parameters {
        let index = match parameter.name() {
            Some(name) => parameter_index(statement, name)?,
            None => {
                position += 1;
                if position > statement.parameter_count() {
                    return Err(ExecuteError::InvalidParameter(format!(
                        "positional parameter {position} exceeds the {} placeholders in the command",
                        statement.parameter_count()
                    )));
                }
                position
            }
        };
        statement
            .raw_bind_parameter(index, value_to_sql(parameter.value()))
            .map_err(ExecuteError::driver)?;
    }
    Ok(())
}

fn parameter_index(
    statement: &Statement<'_>,
    name: &str,
) -> std::result::Result<usize, ExecuteError> {
    let bare = name.trim_start_matches(PARAMETER_PREFIXES);
    for prefix in PARAMETER_PREFIXES {
        let candidate = format!("{prefix}{bare}");
        if let Some(index) = statement
            .parameter_index(&candidate)
            .map_err(ExecuteError::driver)?
        {
            return Ok(index);
        }
    }
    Err(ExecuteError::InvalidParameter(format!(
        "the command has no parameter named '{name}'"
    )))
}

fn is_interrupt(error: &ExecuteError) -> bool {
    match error {
        ExecuteError::Driver(source) => source
            .downcast_ref::<rusqlite::Error>()
            .and_then(rusqlite::Error::sqlite_error_code)
            == Some(ErrorCode::OperationInterrupted),
        _ => false,
    }
}

/// Interrupts a connection unless disarmed before the deadline.
struct Watchdog {
    disarm: mpsc::Sender<()>,
    thread: JoinHandle<bool>,
}

impl Watchdog {
    fn arm(handle: InterruptHandle, timeout: Duration) -> Self {
        let (disarm, armed) = mpsc::channel::<()>();
        let thread = thread::spawn(move || match armed.recv_timeout(timeout) {
            Err(RecvTimeoutError::Timeout) => {
                handle.interrupt();
                true
            }
            _ => false,
        });
        Self { disarm, thread }
    }

    /// Stops the watchdog and reports whether it fired.
    fn disarm(self) -> bool {
        drop(self.disarm);
        self.thread.join().unwrap_or(false)
    }
}

/// Routine catalog over `{catalog_prefix}routines` in the configured database.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`](crate::SqliteError::InvalidPrefix)
/// if the configured prefix is invalid.
pub fn catalog_for(config: &ContextConfig) -> Result<RoutineCatalog<SqliteConnector>> {
    let query = routine_catalog_sql(&config.catalog_prefix)?;
    let connector = SqliteConnector::from_connection_string(&config.connection_string);
    Ok(RoutineCatalog::new(connector, query).with_timeout(config.command_timeout()))
}

/// Synchronizer for a context whose repository is a SQLite database.
///
/// The connection string is not checked here; the synchronizer validates the
/// configuration before it connects.
///
/// # Errors
///
/// Returns [`SqliteError::InvalidPrefix`](crate::SqliteError::InvalidPrefix)
/// if the configured prefix is invalid.
pub fn synchronizer_for(config: ContextConfig) -> Result<Synchronizer<SqliteConnector>> {
    let catalog = catalog_for(&config)?;
    Ok(Synchronizer::with_catalog(config, catalog))
}
