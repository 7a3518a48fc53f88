//! Optional TOML settings.
//!
//! Looked up as `pg-safe-update.toml` in the working directory, then as
//! `<config dir>/pg-safe-update/config.toml`. Every key is optional.
//!
//! ```toml
//! env_file = ".env"
//! schema_file = "schema.sql"
//! backup_dir = "backups"
//! backup_prefix = "shop"
//! pg_dump = "/usr/lib/postgresql/16/bin/pg_dump"
//! default_schema = "public"
//! allow_destructive = false
//! create_database = true
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{UpdateError, UpdateResult};

/// Settings file name looked up in the working directory.
pub const SETTINGS_FILE: &str = "pg-safe-update.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub env_file: PathBuf,
    pub schema_file: PathBuf,
    pub backup_dir: PathBuf,
    /// Backup file prefix; the database name when unset.
    pub backup_prefix: Option<String>,
    pub pg_dump: PathBuf,
    /// Schema that unqualified names resolve to.
    pub default_schema: String,
    pub allow_destructive: bool,
    pub create_database: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env_file: PathBuf::from(".env"),
            schema_file: PathBuf::from("schema.sql"),
            backup_dir: PathBuf::from("backups"),
            backup_prefix: None,
            pg_dump: PathBuf::from("pg_dump"),
            default_schema: "public".to_string(),
            allow_destructive: false,
            create_database: true,
        }
    }
}

impl Settings {
    /// Load settings from `explicit`, or from the first default location
    /// that exists, or fall back to defaults.
    pub fn load(explicit: Option<&Path>) -> UpdateResult<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        for path in Self::candidates() {
            if path.is_file() {
                return Self::from_file(&path);
            }
        }

        debug!("no settings file found, using defaults");
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> UpdateResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            UpdateError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!(path = %path.display(), "loading settings");
        Self::from_toml(&content)
            .map_err(|e| UpdateError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn candidates() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(SETTINGS_FILE)];
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("pg-safe-update").join("config.toml"));
        }
        paths
    }
}
