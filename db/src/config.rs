//! Context configuration for a synchronization run.
//!
//! The configuration is loaded once by the surrounding process and passed by
//! value into the components that need it. JSON is the default format; files
//! ending in `.yaml` or `.yml` are read as YAML.
//!
//! # Example JSON
//!
//! ```json
//! {
//!   "connectionString": "sqlite:./catalog.db",
//!   "schemaDirectory": "./database/schema",
//!   "stagedWrites": false,
//!   "commandTimeoutSecs": 30,
//!   "catalogPrefix": "information_schema_"
//! }
//! ```

use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// File name searched for when no configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "context-config.json";

/// Default per-command timeout, in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Default table prefix of the routine catalog for embedded backends.
pub const DEFAULT_CATALOG_PREFIX: &str = "information_schema_";

/// Settings for one data context: where its routines live and where their
/// files are written.
///
/// # Examples
///
/// ```
/// use routine_sync_db::ContextConfig;
///
/// let config = ContextConfig::new("sqlite:app.db", "schema/");
/// assert!(config.validate().is_ok());
///
/// let blank = ContextConfig::new("   ", "schema/");
/// assert!(blank.validate().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextConfig {
    /// Connection string understood by the configured backend.
    #[serde(default)]
    pub connection_string: String,
    /// Root directory of the materialized routine files.
    #[serde(default)]
    pub schema_directory: PathBuf,
    /// Build each kind directory in a staging area and swap it into place.
    #[serde(default)]
    pub staged_writes: bool,
    /// Timeout applied to each catalog command.
    #[serde(default = "default_timeout")]
    pub command_timeout_secs: u64,
    /// Table prefix of the routine catalog for embedded backends.
    #[serde(default = "default_catalog_prefix")]
    pub catalog_prefix: String,
}

fn default_timeout() -> u64 {
    DEFAULT_COMMAND_TIMEOUT_SECS
}

fn default_catalog_prefix() -> String {
    DEFAULT_CATALOG_PREFIX.to_string()
}

impl ContextConfig {
    pub fn new(connection_string: impl Into<String>, schema_directory: impl Into<PathBuf>) -> Self {
        Self {
            connection_string: connection_string.into(),
            schema_directory: schema_directory.into(),
            staged_writes: false,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            catalog_prefix: DEFAULT_CATALOG_PREFIX.to_string(),
        }
    }

    /// Enables or disables staged directory replacement.
    pub fn with_staged_writes(mut self, staged: bool) -> Self {
        self.staged_writes = staged;
        self
    }

    /// Loads configuration from a JSON or YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ConfigError::IoError) if the file cannot be read,
    /// or [`JsonError`](ConfigError::JsonError) /
    /// [`YamlError`](ConfigError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = if is_yaml(path) {
            serde_yaml::from_reader(reader)?
        } else {
            serde_json::from_reader(reader)?
        };
        Ok(config)
    }

    /// Saves the configuration, choosing the format from the extension.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        if is_yaml(path) {
            serde_yaml::to_writer(writer, self)?;
        } else {
            serde_json::to_writer_pretty(writer, self)?;
        }
        Ok(())
    }

    /// Resolves the configuration file to use.
    ///
    /// An explicit path must exist. Without one, the first existing file
    /// among [`candidate_paths`](Self::candidate_paths) is used.
    ///
    /// # Errors
    ///
    /// Returns [`NotFound`](ConfigError::NotFound) listing every searched path.
    pub fn locate(explicit: Option<&Path>) -> Result<PathBuf> {
        let candidates = match explicit {
            Some(path) => vec![path.to_path_buf()],
            None => Self::candidate_paths(),
        };
        candidates
            .iter()
            .find(|path| path.is_file())
            .cloned()
            .ok_or_else(|| {
                let searched: Vec<String> = candidates
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                ConfigError::NotFound(searched.join(", "))
            })
    }

    /// Default search locations: the working directory, then the parent of
    /// the directory holding the running executable.
    pub fn candidate_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(DEFAULT_CONFIG_FILE)];
        if let Some(parent) = std::env::current_exe()
            .ok()
            .as_deref()
            .and_then(Path::parent)
            .and_then(Path::parent)
        {
            paths.push(parent.join(DEFAULT_CONFIG_FILE));
        }
        paths
    }

    /// Checks the preconditions of a synchronization run.
    ///
    /// # Errors
    ///
    /// Returns [`BlankConnectionString`](ConfigError::BlankConnectionString)
    /// or [`BlankSchemaDirectory`](ConfigError::BlankSchemaDirectory).
    pub fn validate(&self) -> Result<()> {
        if self.connection_string.trim().is_empty() {
            return Err(ConfigError::BlankConnectionString);
        }
        if self.schema_directory.to_string_lossy().trim().is_empty() {
            return Err(ConfigError::BlankSchemaDirectory);
        }
        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    )
}
