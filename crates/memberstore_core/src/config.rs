//! Store configuration.
//!
//! # Responsibility
//! - Describe which database to open, how to provision connections and how
//!   to log.
//! - Load that description from JSON files with per-field defaults.
//!
//! # Invariants
//! - A validated config has a non-empty database path and a non-zero pool.

use crate::db::DataSourceOptions;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How repositories obtain connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisioningMode {
    /// Fresh connection per call, uncategorized faults.
    Driver,
    /// Pooled, transaction-aware, faults classified by result code.
    #[default]
    Managed,
    /// Managed provisioning behind the SQL template.
    Template,
}

impl ProvisioningMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Driver => "driver",
            Self::Managed => "managed",
            Self::Template => "template",
        }
    }
}

impl Display for ProvisioningMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProvisioningMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "driver" => Ok(Self::Driver),
            "managed" => Ok(Self::Managed),
            "template" => Ok(Self::Template),
            other => Err(ConfigError::Invalid(format!(
                "unsupported mode `{other}`; expected driver|managed|template"
            ))),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Store configuration, deserialized from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database file.
    pub database: PathBuf,
    pub mode: ProvisioningMode,
    pub pool_max_size: u32,
    pub connection_timeout_ms: u64,
    pub busy_timeout_ms: u64,
    /// Log level for file logging; `None` uses the build-mode default.
    pub log_level: Option<String>,
    /// Absolute log directory; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let pool = DataSourceOptions::default();
        Self {
            database: PathBuf::from("memberstore.sqlite3"),
            mode: ProvisioningMode::default(),
            pool_max_size: pool.max_size,
            connection_timeout_ms: duration_ms(pool.connection_timeout),
            busy_timeout_ms: duration_ms(pool.busy_timeout),
            log_level: None,
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Default config pointing at `database`.
    pub fn for_database(database: impl Into<PathBuf>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Parses and validates a JSON document. Missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("database path cannot be empty".to_string()));
        }
        if self.pool_max_size == 0 {
            return Err(ConfigError::Invalid(
                "pool_max_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn data_source_options(&self) -> DataSourceOptions {
        DataSourceOptions {
            max_size: self.pool_max_size,
            connection_timeout: Duration::from_millis(self.connection_timeout_ms),
            busy_timeout: self.busy_timeout(),
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
