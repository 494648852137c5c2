use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap::error::ErrorKind;
use routine_sync_core::{Outcome, Parameter, Routine, RoutineKind, Row, Value};
use routine_sync_db::{
    ContextConfig, DEFAULT_CATALOG_PREFIX, ExecuteError, Executor, Request, SyncReport, SyncStatus,
};
use routine_sync_sqlite::{
    CatalogEntry, CatalogMigration, Registration, RoutineStore, SqliteConnector, catalog_for,
    synchronizer_for,
};
use serde::Serialize;
use tracing::debug;
use tracing_subscriber::EnvFilter;

const PACKAGE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Output format for listings and query results.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
enum CliOutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
}

#[derive(Debug, Parser)]
#[command(name = "routine-sync")]
#[command(version = PACKAGE_VERSION)]
#[command(about = "Materialize database routines as source files and run ad-hoc SQL")]
struct Cli {
    /// Context configuration file (JSON, or YAML by extension). Defaults to
    /// context-config.json in the working directory, then next to the
    /// executable's parent directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Operations against the configured data context.
    Sql(SqlArgs),
    /// Manage the SQLite routine catalog table.
    Catalog(CatalogArgs),
}

#[derive(Debug, Args)]
struct SqlArgs {
    #[command(subcommand)]
    operation: SqlOperation,
}

#[derive(Debug, Subcommand)]
enum SqlOperation {
    /// Routine snapshot operations.
    Routines(RoutinesArgs),
    /// Execute one SQL command and print its rows.
    Exec(ExecArgs),
}

#[derive(Debug, Args)]
struct RoutinesArgs {
    #[command(subcommand)]
    operation: RoutinesOperation,
}

#[derive(Debug, Subcommand)]
enum RoutinesOperation {
    /// Replace the routine files under the schema directory.
    Sync,
    /// List the routines in the catalog without writing files.
    List(ListArgs),
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct ExecArgs {
    /// SQL text, or the procedure name with --procedure.
    text: String,
    /// Invoke TEXT as a stored procedure.
    #[arg(long)]
    procedure: bool,
    /// Parameter as NAME=VALUE, or a bare VALUE bound by position. Repeatable.
    #[arg(long = "param", value_name = "NAME=VALUE")]
    params: Vec<String>,
    /// Command timeout in seconds (defaults to the configured timeout).
    #[arg(long)]
    timeout: Option<u64>,
    #[arg(long, default_value = "table")]
    format: CliOutputFormat,
}

#[derive(Debug, Args)]
struct CatalogArgs {
    #[command(subcommand)]
    operation: CatalogOperation,
}

#[derive(Debug, Subcommand)]
enum CatalogOperation {
    /// Create the catalog table.
    Up(CatalogDbArgs),
    /// Drop the catalog table.
    Down(CatalogDbArgs),
    /// Show whether the catalog table exists and how many routines it holds.
    Status(CatalogDbArgs),
    /// Register or replace a routine.
    Register(RegisterArgs),
    /// Remove a routine.
    Remove(RemoveArgs),
}

#[derive(Debug, Args)]
struct CatalogDbArgs {
    /// Database file path.
    #[arg(long)]
    db: PathBuf,
    /// Table prefix.
    #[arg(long, default_value = DEFAULT_CATALOG_PREFIX)]
    prefix: String,
}

#[derive(Debug, Args)]
struct RegisterArgs {
    #[command(flatten)]
    target: CatalogDbArgs,
    /// Routine schema.
    #[arg(long, default_value = routine_sync_sqlite::DEFAULT_SCHEMA)]
    schema: String,
    /// Routine name.
    #[arg(long)]
    name: String,
    /// procedure, scalar, or table.
    #[arg(long)]
    kind: RoutineKind,
    /// Override the DATA_TYPE column (e.g. the scalar return type).
    #[arg(long)]
    data_type: Option<String>,
    /// Routine definition text.
    #[arg(long, conflicts_with = "file", required_unless_present = "file")]
    definition: Option<String>,
    /// Read the routine definition from a file.
    #[arg(long)]
    file: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct RemoveArgs {
    #[command(flatten)]
    target: CatalogDbArgs,
    #[arg(long, default_value = routine_sync_sqlite::DEFAULT_SCHEMA)]
    schema: String,
    #[arg(long)]
    name: String,
}

fn main() {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            err.print().ok();
            if !matches!(
                err.kind(),
                ErrorKind::DisplayHelp
                    | ErrorKind::DisplayVersion
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                println!();
                Cli::command().print_help().ok();
            }
            return;
        }
    };

    let config = cli.config.as_deref();
    let result = match cli.command {
        Command::Sql(args) => run_sql(args, config),
        Command::Catalog(args) => run_catalog(args),
    };

    // Failures are reported on the console only; the exit status stays 0.
    if let Err(err) = result {
        eprintln!("error: {err}");
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(explicit: Option<&Path>) -> Result<ContextConfig, String> {
    let path = ContextConfig::locate(explicit)
        .map_err(|e| format!("Could not find the configuration file: {e}"))?;
    debug!(path = %path.display(), "Loading context configuration");
    ContextConfig::load(&path).map_err(|e| {
        format!(
            "Could not interpret the configuration file '{}': {e}",
            path.display()
        )
    })
}

fn run_sql(args: SqlArgs, config: Option<&Path>) -> Result<(), String> {
    let config = load_config(config)?;
    match args.operation {
        SqlOperation::Routines(routines) => match routines.operation {
            RoutinesOperation::Sync => run_routines_sync(config),
            RoutinesOperation::List(list) => run_routines_list(config, list),
        },
        SqlOperation::Exec(exec) => run_exec(config, exec),
    }
}

fn run_routines_sync(config: ContextConfig) -> Result<(), String> {
    let report = synchronizer_for(config)
        .map_err(|e| format!("Failed to prepare synchronization: {e}"))?
        .synchronize();
    print_sync_report(&report);
    Ok(())
}

fn print_sync_report(report: &SyncReport) {
    if matches!(report.status, SyncStatus::Completed | SyncStatus::NoRoutines) {
        println!("Scalar functions: {}.", report.counts.scalar_functions);
        println!("Table functions: {}.", report.counts.table_functions);
        println!("Stored procedures: {}.", report.counts.procedures);
        if report.counts.unmapped > 0 {
            println!("Unclassified routines: {}.", report.counts.unmapped);
        }
    }
    println!("{}", report.message);
    for failure in &report.failures {
        println!("  failed: {failure}");
    }
}

#[derive(Serialize)]
struct RoutineSummary {
    routine: String,
    kind: Option<RoutineKind>,
    created: String,
    modified: String,
}

impl From<&Routine> for RoutineSummary {
    fn from(routine: &Routine) -> Self {
        Self {
            routine: routine.qualified_name(),
            kind: routine.kind,
            created: routine.created.to_string(),
            modified: routine.modified.to_string(),
        }
    }
}

fn run_routines_list(config: ContextConfig, args: ListArgs) -> Result<(), String> {
    config.validate().map_err(|e| e.to_string())?;
    let routines = catalog_for(&config)
        .map_err(|e| format!("Failed to prepare the catalog: {e}"))?
        .list_routines();
    let summaries: Vec<RoutineSummary> = routines.iter().map(RoutineSummary::from).collect();

    match args.format {
        CliOutputFormat::Table => {
            if summaries.is_empty() {
                println!("There are no routines associated with the schema.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = summaries
                .iter()
                .map(|s| {
                    vec![
                        s.routine.clone(),
                        s.kind.map(RoutineKind::label).unwrap_or("unmapped").to_string(),
                        s.created.clone(),
                        s.modified.clone(),
                    ]
                })
                .collect();
            print_table(&["ROUTINE", "KIND", "CREATED", "MODIFIED"], &rows);
        }
        format => println!("{}", serialize(&summaries, format)?),
    }
    Ok(())
}

fn run_exec(config: ContextConfig, args: ExecArgs) -> Result<(), String> {
    config.validate().map_err(|e| e.to_string())?;

    let parameters: Vec<Parameter> = args.params.iter().map(|raw| parse_param(raw)).collect();
    let timeout = Duration::from_secs(args.timeout.unwrap_or(config.command_timeout_secs));
    let request = if args.procedure {
        Request::procedure(args.text)
    } else {
        Request::new(args.text)
    }
    .with_parameters(parameters)
    .with_timeout(timeout);

    let executor = Executor::new(SqliteConnector::from_connection_string(
        &config.connection_string,
    ));
    let outcome = executor.execute(&request);
    print_outcome(&outcome, args.format)
}

fn print_outcome(
    outcome: &Outcome<Vec<Row>, ExecuteError>,
    format: CliOutputFormat,
) -> Result<(), String> {
    match format {
        CliOutputFormat::Table => {
            if let Some(first) = outcome.items().first() {
                let header: Vec<&str> = first.column_names().collect();
                let rows: Vec<Vec<String>> = outcome
                    .items()
                    .iter()
                    .map(|row| {
                        row.cells()
                            .iter()
                            .map(|cell| cell.value().to_display_string())
                            .collect()
                    })
                    .collect();
                print_table(&header, &rows);
            }
            println!("{}", outcome.message());
        }
        format => println!("{}", serialize(outcome, format)?),
    }
    Ok(())
}

/// `NAME=VALUE` binds by name; a bare value binds by position.
fn parse_param(raw: &str) -> Parameter {
    match raw.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Parameter::named(name.trim(), parse_value(value))
        }
        _ => Parameter::positional(parse_value(raw)),
    }
}

fn parse_value(raw: &str) -> Value {
    if raw.eq_ignore_ascii_case("null") {
        Value::Null
    } else if let Ok(i) = raw.parse::<i64>() {
        Value::Integer(i)
    } else if let Ok(f) = raw.parse::<f64>() {
        Value::Float(f)
    } else if let Ok(b) = raw.parse::<bool>() {
        Value::Bool(b)
    } else {
        Value::Text(raw.to_string())
    }
}

fn serialize<T: Serialize>(value: &T, format: CliOutputFormat) -> Result<String, String> {
    match format {
        CliOutputFormat::Json => serde_json::to_string_pretty(value)
            .map_err(|e| format!("JSON serialization failed: {e}")),
        CliOutputFormat::Yaml => {
            serde_yaml::to_string(value).map_err(|e| format!("YAML serialization failed: {e}"))
        }
        CliOutputFormat::Table => Err("table output is not serialized".to_string()),
    }
}

fn print_table<H: AsRef<str>>(header: &[H], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = header.iter().map(|h| h.as_ref().chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            let len = cell.chars().count();
            match widths.get_mut(i) {
                Some(width) => *width = (*width).max(len),
                None => widths.push(len),
            }
        }
    }

    let header: Vec<&str> = header.iter().map(AsRef::as_ref).collect();
    println!("{}", format_line(&header, &widths));
    for row in rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        println!("{}", format_line(&cells, &widths));
    }
}

fn format_line(cells: &[&str], widths: &[usize]) -> String {
    cells
        .iter()
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect::<Vec<_>>()
        .join("  ")
        .trim_end()
        .to_string()
}

fn open_catalog(args: &CatalogDbArgs) -> Result<rusqlite::Connection, String> {
    rusqlite::Connection::open(&args.db)
        .map_err(|e| format!("Failed to open database '{}': {e}", args.db.display()))
}

fn run_catalog(args: CatalogArgs) -> Result<(), String> {
    match args.operation {
        CatalogOperation::Up(a) => run_catalog_up(a),
        CatalogOperation::Down(a) => run_catalog_down(a),
        CatalogOperation::Status(a) => run_catalog_status(a),
        CatalogOperation::Register(a) => run_catalog_register(a),
        CatalogOperation::Remove(a) => run_catalog_remove(a),
    }
}

fn run_catalog_up(args: CatalogDbArgs) -> Result<(), String> {
    let mut migration = CatalogMigration::new(open_catalog(&args)?, &args.prefix)
        .map_err(|e| format!("Failed to initialize migration: {e}"))?;
    migration
        .up()
        .map_err(|e| format!("Catalog up failed: {e}"))?;
    println!(
        "Catalog up complete. Table '{}routines' created in '{}'.",
        args.prefix,
        args.db.display()
    );
    Ok(())
}

fn run_catalog_down(args: CatalogDbArgs) -> Result<(), String> {
    let mut migration = CatalogMigration::new(open_catalog(&args)?, &args.prefix)
        .map_err(|e| format!("Failed to initialize migration: {e}"))?;
    migration
        .down()
        .map_err(|e| format!("Catalog down failed: {e}"))?;
    println!(
        "Catalog down complete. Table '{}routines' dropped from '{}'.",
        args.prefix,
        args.db.display()
    );
    Ok(())
}

fn run_catalog_status(args: CatalogDbArgs) -> Result<(), String> {
    let migration = CatalogMigration::new(open_catalog(&args)?, &args.prefix)
        .map_err(|e| format!("Failed to initialize migration: {e}"))?;
    let status = migration
        .status()
        .map_err(|e| format!("Failed to get catalog status: {e}"))?;
    println!("Catalog Status:");
    println!(
        "  Table exists: {}",
        if status.table_exists { "yes" } else { "no" }
    );
    println!("  Routine count: {}", status.routine_count);
    println!("  Procedure count: {}", status.procedure_count);
    println!("  Function count: {}", status.function_count);
    Ok(())
}

fn run_catalog_register(args: RegisterArgs) -> Result<(), String> {
    let definition = match (&args.definition, &args.file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => fs::read_to_string(path)
            .map_err(|e| format!("Failed to read '{}': {e}", path.display()))?,
        (None, None) => return Err("either --definition or --file is required".to_string()),
    };

    let mut entry = CatalogEntry::new(&args.schema, &args.name, args.kind, definition);
    if let Some(data_type) = args.data_type.as_deref() {
        entry = entry.with_data_type(Some(data_type));
    }

    let mut store = RoutineStore::new(open_catalog(&args.target)?, &args.target.prefix)
        .map_err(|e| format!("Failed to open catalog: {e}"))?;
    let registration = store
        .register(&entry)
        .map_err(|e| format!("Register failed: {e}"))?;
    let verb = match registration {
        Registration::Inserted => "Registered",
        Registration::Updated => "Updated",
    };
    println!("{verb} {} [{}].[{}].", args.kind, entry.schema, entry.name);
    Ok(())
}

fn run_catalog_remove(args: RemoveArgs) -> Result<(), String> {
    let mut store = RoutineStore::new(open_catalog(&args.target)?, &args.target.prefix)
        .map_err(|e| format!("Failed to open catalog: {e}"))?;
    store
        .remove(&args.schema, &args.name)
        .map_err(|e| format!("Remove failed: {e}"))?;
    println!("Removed [{}].[{}].", args.schema, args.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param_named_and_positional() {
        let named = parse_param("@id=7");
        assert_eq!(named.name(), Some("@id"));
        assert_eq!(named.value(), &Value::Integer(7));

        let positional = parse_param("hello");
        assert_eq!(positional.name(), None);
        assert_eq!(positional.value(), &Value::Text("hello".into()));

        let leading_equals = parse_param("=x");
        assert_eq!(leading_equals.name(), None);
    }

    #[test]
    fn test_parse_value_types() {
        assert_eq!(parse_value("NULL"), Value::Null);
        assert_eq!(parse_value("2.5"), Value::Float(2.5));
        assert_eq!(parse_value("true"), Value::Bool(true));
        assert_eq!(parse_value("a=b"), Value::Text("a=b".into()));
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }
}
