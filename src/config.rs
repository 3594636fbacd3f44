//! Runtime configuration.
//!
//! Values are resolved from, in increasing precedence: built-in defaults, the TOML file named by
//! `CONTENT_MIGRATE_CONFIG` (if set), and individual environment variables.

use crate::{backup::BackupConfig, Error};
use rusqlite::{Connection, OpenFlags};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const CONFIG_FILE_ENV: &str = "CONTENT_MIGRATE_CONFIG";
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";
pub const BACKUP_DIR_ENV: &str = "BACKUP_DIR";
pub const SQLITE3_PATH_ENV: &str = "SQLITE3_PATH";
pub const ON_CONFLICT_ENV: &str = "ON_CONFLICT";

/// What to do when a migrated item's id is already present in the destination table.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnConflict {
    /// Abort the run. The migration is a one-shot bulk load.
    Fail,
    /// Overwrite the existing row, keeping its id and type.
    Upsert,
}

impl Default for OnConflict {
    fn default() -> Self {
        OnConflict::Fail
    }
}

impl FromStr for OnConflict {
    type Err = Error;

    fn from_str(s: &str) -> Result<OnConflict, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(OnConflict::Fail),
            "upsert" => Ok(OnConflict::Upsert),
            other => Err(Error::InvalidConfig(format!(
                "on_conflict must be `fail` or `upsert`, not {:?}",
                other
            ))),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    database_url: Option<String>,
    backup_dir: Option<PathBuf>,
    sqlite3_path: Option<PathBuf>,
    on_conflict: Option<OnConflict>,
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Config {
    pub database_url: String,
    pub backup_dir: PathBuf,
    pub sqlite3_path: PathBuf,
    pub on_conflict: OnConflict,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Config, Error> {
        let file = match std::env::var_os(CONFIG_FILE_ENV) {
            Some(path) => {
                let path = PathBuf::from(path);
                log::debug!("reading config from {}", path.display());
                Some(std::fs::read_to_string(path)?)
            }
            None => None,
        };
        Config::resolve(file.as_deref(), |key| std::env::var(key).ok())
    }

    /// Resolve configuration from optional TOML text and an environment lookup.
    pub fn resolve<F>(file: Option<&str>, env: F) -> Result<Config, Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: FileConfig = match file {
            Some(text) => toml::from_str(text)?,
            None => FileConfig::default(),
        };
        let env = |key: &str| env(key).filter(|value| !value.trim().is_empty());

        let database_url = env(DATABASE_URL_ENV)
            .or(file.database_url)
            .ok_or(Error::MissingEnv(DATABASE_URL_ENV))?;
        let backup_dir = env(BACKUP_DIR_ENV)
            .map(PathBuf::from)
            .or(file.backup_dir)
            .unwrap_or_else(|| PathBuf::from("backups"));
        let sqlite3_path = env(SQLITE3_PATH_ENV)
            .map(PathBuf::from)
            .or(file.sqlite3_path)
            .unwrap_or_else(|| PathBuf::from("sqlite3"));
        let on_conflict = match env(ON_CONFLICT_ENV) {
            Some(value) => value.parse()?,
            None => file.on_conflict.unwrap_or_default(),
        };

        Ok(Config {
            database_url,
            backup_dir,
            sqlite3_path,
            on_conflict,
        })
    }

    /// The database file named by `database_url`, without any `sqlite:` scheme.
    pub fn database_path(&self) -> &Path {
        let url = self.database_url.as_str();
        let path = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .or_else(|| url.strip_prefix("file:"))
            .unwrap_or(url);
        Path::new(path)
    }

    /// Open the configured database for the migration. The database must already exist.
    pub fn open_database(&self) -> Result<Connection, Error> {
        log::debug!("opening {}", self.database_path().display());
        Ok(Connection::open_with_flags(
            self.database_path(),
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?)
    }

    pub fn open_database_read_only(&self) -> Result<Connection, Error> {
        Ok(Connection::open_with_flags(
            self.database_path(),
            OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?)
    }

    pub fn backup(&self) -> BackupConfig {
        BackupConfig {
            database_path: self.database_path().to_path_buf(),
            backup_dir: self.backup_dir.clone(),
            sqlite3_path: self.sqlite3_path.clone(),
        }
    }
}
