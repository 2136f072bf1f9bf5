//! Store configuration sourced from the process environment.
//!
//! | Variable              | Meaning                                         |
//! |-----------------------|-------------------------------------------------|
//! | `STRUCTURE_DATABASE`  | SQLite file path; unset or `:memory:` = memory |
//! | `STRUCTURE_LOG_LEVEL` | `trace|debug|info|warn|error`                   |
//! | `STRUCTURE_LOG_DIR`   | absolute directory for rolling log files        |

use crate::db::{open_db, open_db_in_memory, DbResult};
use crate::logging::{default_log_level, init_logging, normalize_level, normalize_log_dir};
use rusqlite::Connection;
use std::path::PathBuf;
use thiserror::Error;

pub const DATABASE_ENV: &str = "STRUCTURE_DATABASE";
pub const LOG_LEVEL_ENV: &str = "STRUCTURE_LOG_LEVEL";
pub const LOG_DIR_ENV: &str = "STRUCTURE_LOG_DIR";

const IN_MEMORY_MARKER: &str = ":memory:";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("STRUCTURE_LOG_LEVEL: {0}")]
    InvalidLogLevel(String),
    #[error("STRUCTURE_LOG_DIR: {0}")]
    InvalidLogDir(String),
}

/// Where the relational store lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    InMemory,
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database: DatabaseLocation,
    pub log_level: &'static str,
    /// File logging stays off when unset.
    pub log_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: DatabaseLocation::InMemory,
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl StoreConfig {
    /// Reads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, treating blank values as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let database = match read(DATABASE_ENV) {
            None => DatabaseLocation::InMemory,
            Some(value) if value == IN_MEMORY_MARKER => DatabaseLocation::InMemory,
            Some(value) => DatabaseLocation::File(PathBuf::from(value)),
        };

        let log_level = match read(LOG_LEVEL_ENV) {
            Some(value) => normalize_level(&value).map_err(ConfigError::InvalidLogLevel)?,
            None => default_log_level(),
        };

        let log_dir = read(LOG_DIR_ENV)
            .map(|value| normalize_log_dir(&value))
            .transpose()
            .map_err(ConfigError::InvalidLogDir)?;

        Ok(Self {
            database,
            log_level,
            log_dir,
        })
    }

    /// Opens the configured store with migrations applied.
    pub fn open_connection(&self) -> DbResult<Connection> {
        match &self.database {
            DatabaseLocation::InMemory => open_db_in_memory(),
            DatabaseLocation::File(path) => open_db(path),
        }
    }

    /// Starts file logging when a log directory is configured.
    ///
    /// Returns `Ok(false)` when logging is disabled by configuration.
    pub fn init_logging(&self) -> Result<bool, String> {
        let Some(log_dir) = self.log_dir.as_ref() else {
            return Ok(false);
        };
        let log_dir = log_dir
            .to_str()
            .ok_or_else(|| format!("log_dir `{}` is not valid UTF-8", log_dir.display()))?;
        init_logging(self.log_level, log_dir)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ConfigError, DatabaseLocation, StoreConfig, DATABASE_ENV, LOG_DIR_ENV, LOG_LEVEL_ENV,
    };
    use crate::db::migrations::{current_version, latest_version};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = StoreConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, StoreConfig::default());
    }

    #[test]
    fn reads_file_database_level_and_log_dir() {
        let config = StoreConfig::from_lookup(lookup(&[
            (DATABASE_ENV, " /var/lib/structure/app.db "),
            (LOG_LEVEL_ENV, "Warning"),
            (LOG_DIR_ENV, "/var/log/structure"),
        ]))
        .unwrap();

        assert_eq!(
            config.database,
            DatabaseLocation::File(PathBuf::from("/var/lib/structure/app.db"))
        );
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/structure")));
    }

    #[test]
    fn memory_marker_and_blank_values_mean_in_memory() {
        for value in [":memory:", "   "] {
            let config = StoreConfig::from_lookup(lookup(&[(DATABASE_ENV, value)])).unwrap();
            assert_eq!(config.database, DatabaseLocation::InMemory);
        }
    }

    #[test]
    fn rejects_bad_level_and_relative_log_dir() {
        let err = StoreConfig::from_lookup(lookup(&[(LOG_LEVEL_ENV, "loud")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel(_)));

        let err = StoreConfig::from_lookup(lookup(&[(LOG_DIR_ENV, "logs")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogDir(_)));
    }

    #[test]
    fn open_connection_applies_migrations_and_logging_stays_off() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("structure.db");
        let config = StoreConfig {
            database: DatabaseLocation::File(path.clone()),
            ..StoreConfig::default()
        };

        let conn = config.open_connection().unwrap();
        assert_eq!(current_version(&conn).unwrap(), latest_version());
        assert!(path.exists());
        assert_eq!(config.init_logging(), Ok(false));
    }
}
