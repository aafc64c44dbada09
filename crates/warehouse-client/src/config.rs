//! Connection settings.

use std::{path::Path, time::Duration};

use rusqlite::{Connection, OpenFlags};
use serde::Deserialize;
use tracing::debug;

use crate::{WarehouseError, WarehouseResult};

/// Environment variable naming the warehouse database file.
pub const ENV_VAR: &str = "WAREHOUSE_CONNECTION";

/// How to open the warehouse database.
///
/// ```json
/// { "path": "warehouse.sqlite", "read_only": true, "busy_timeout_ms": 5000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WarehouseConfig {
    /// SQLite database file.
    pub path: String,
    /// Open without write access.
    #[serde(default)]
    pub read_only: bool,
    /// How long to wait on a locked database.
    #[serde(default)]
    pub busy_timeout_ms: Option<u64>,
    /// Enforce foreign keys (on unless disabled).
    #[serde(default = "default_foreign_keys")]
    pub foreign_keys: bool,
}

fn default_foreign_keys() -> bool {
    true
}

impl WarehouseConfig {
    /// A read-write configuration with foreign keys enforced.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            read_only: false,
            busy_timeout_ms: None,
            foreign_keys: true,
        }
    }
    /// Parses a JSON configuration.
    pub fn from_json_str(json: &str) -> WarehouseResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
    /// Reads a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> WarehouseResult<Self> {
        Self::from_json_str(&std::fs::read_to_string(path)?)
    }
    /// Reads the database path from [`ENV_VAR`].
    pub fn from_env() -> WarehouseResult<Self> {
        std::env::var(ENV_VAR)
            .map(Self::new)
            .map_err(|e| WarehouseError::ConfigError(format!("{ENV_VAR}: {e}")))
    }

    /// Opens a connection honouring every setting.
    pub fn open_connection(&self) -> WarehouseResult<Connection> {
        if self.path.is_empty() {
            return Err(WarehouseError::ConfigError("empty database path".to_string()));
        }
        let access = if self.read_only {
            OpenFlags::SQLITE_OPEN_READ_ONLY
        } else {
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE
        };
        let connection = Connection::open_with_flags(
            &self.path,
            access | OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        connection.pragma_update(None, "foreign_keys", if self.foreign_keys { "ON" } else { "OFF" })?;
        if let Some(ms) = self.busy_timeout_ms {
            connection.busy_timeout(Duration::from_millis(ms))?;
        }
        debug!(path = %self.path, read_only = self.read_only, "opened warehouse connection");
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_defaults() {
        let config = WarehouseConfig::from_json_str(r#"{"path": "w.sqlite"}"#).unwrap();
        assert_eq!(config, WarehouseConfig::new("w.sqlite"));
        let config = WarehouseConfig::from_json_str(
            r#"{"path": "w.sqlite", "read_only": true, "busy_timeout_ms": 250, "foreign_keys": false}"#,
        )
        .unwrap();
        assert!(config.read_only);
        assert_eq!(config.busy_timeout_ms, Some(250));
        assert!(!config.foreign_keys);
        assert!(matches!(
            WarehouseConfig::from_json_str(r#"{"read_only": true}"#),
            Err(WarehouseError::JsonError(_))
        ));
    }

    #[test]
    fn empty_path_is_rejected() {
        assert!(matches!(
            WarehouseConfig::new("").open_connection(),
            Err(WarehouseError::ConfigError(_))
        ));
    }
}
