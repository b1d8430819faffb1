//! Store configuration.
//!
//! Sources, in increasing precedence: built-in defaults, an optional JSON
//! file, `BRICKSTORE_*` environment variables. Callers layer command-line
//! flags on top.
//!
//! # Invariants
//! - A returned `StoreConfig` has a valid table identifier and log level.
//! - Empty environment values are treated as unset.

use crate::db::DbOptions;
use crate::logging::{default_log_level, normalize_level};
use crate::model::record::{MergePolicy, ITEM_TABLE};
use crate::repo::table_repo::is_valid_identifier;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DB_PATH: &str = "BRICKSTORE_DB_PATH";
pub const ENV_TABLE: &str = "BRICKSTORE_TABLE";
pub const ENV_MERGE_POLICY: &str = "BRICKSTORE_MERGE_POLICY";
pub const ENV_LOG_LEVEL: &str = "BRICKSTORE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "BRICKSTORE_LOG_DIR";
pub const ENV_BUSY_TIMEOUT_MS: &str = "BRICKSTORE_BUSY_TIMEOUT_MS";

const DEFAULT_DB_FILE_NAME: &str = "brickstore.sqlite3";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::InvalidValue {
                field,
                value,
                reason,
            } => write!(f, "invalid `{field}` value `{value}`: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::InvalidValue { .. } => None,
        }
    }
}

/// Runtime settings for opening the store and dispatching calls.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// Name of the item table.
    pub table_name: String,
    /// Update semantics for upserts on existing keys.
    pub merge_policy: MergePolicy,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Rolling log directory. Logging is discarded when unset.
    pub log_dir: Option<PathBuf>,
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            table_name: ITEM_TABLE.to_string(),
            merge_policy: MergePolicy::default(),
            log_level: default_log_level().to_string(),
            log_dir: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validated()
    }

    /// Defaults overridden by process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_env_overrides(|name| std::env::var(name).ok())
    }

    /// Overrides fields from variables resolved through `lookup`.
    pub fn apply_env_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = read(ENV_DB_PATH) {
            self.db_path = PathBuf::from(value);
        }
        if let Some(value) = read(ENV_TABLE) {
            self.table_name = value;
        }
        if let Some(value) = read(ENV_MERGE_POLICY) {
            self.merge_policy =
                MergePolicy::parse(&value).ok_or_else(|| ConfigError::InvalidValue {
                    field: "merge_policy",
                    value: value.clone(),
                    reason: "expected merge|overwrite".to_string(),
                })?;
        }
        if let Some(value) = read(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
        if let Some(value) = read(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = read(ENV_BUSY_TIMEOUT_MS) {
            self.busy_timeout_ms =
                value
                    .parse::<u64>()
                    .map_err(|err| ConfigError::InvalidValue {
                        field: "busy_timeout_ms",
                        value: value.clone(),
                        reason: err.to_string(),
                    })?;
        }

        self.validated()
    }

    /// Connection options derived from this config.
    pub fn db_options(&self) -> DbOptions {
        DbOptions {
            busy_timeout: Duration::from_millis(self.busy_timeout_ms),
        }
    }

    fn validated(mut self) -> Result<Self, ConfigError> {
        if !is_valid_identifier(&self.table_name) {
            return Err(ConfigError::InvalidValue {
                field: "table_name",
                value: self.table_name,
                reason: "expected [A-Za-z_][A-Za-z0-9_]*".to_string(),
            });
        }
        match normalize_level(&self.log_level) {
            Ok(level) => self.log_level = level.to_string(),
            Err(reason) => {
                return Err(ConfigError::InvalidValue {
                    field: "log_level",
                    value: self.log_level,
                    reason,
                });
            }
        }
        Ok(self)
    }
}
