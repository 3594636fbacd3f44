pub mod backup;
pub mod config;
pub mod content;
pub mod mapping;
pub mod migrate;
pub mod schema;
pub mod source;
pub mod validate;

#[cfg(test)]
pub(crate) mod fixtures;

use thiserror::Error;

pub use backup::{write_backup, BackupConfig, BackupOutcome};
pub use config::{Config, OnConflict};
pub use content::{ContentItem, ContentType};
pub use migrate::{run, MigrationOptions, MigrationReport, MigrationStats};
pub use validate::{validate, ValidationReport};

#[derive(Debug, Error)]
pub enum Error {
    #[error("IO")]
    Io(#[from] std::io::Error),
    #[error("database")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json")]
    Json(#[from] serde_json::Error),
    #[error("malformed config file")]
    Toml(#[from] toml::de::Error),
    #[error("{table} record {id:?} is missing required field `{field}`")]
    MissingField {
        table: &'static str,
        id: String,
        field: &'static str,
    },
    #[error("{table} record {id:?} has malformed json in column `{column}`")]
    MalformedJson {
        table: &'static str,
        id: String,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("content item {id:?} already exists with a type other than {content_type}")]
    ContentTypeChanged {
        id: String,
        content_type: ContentType,
    },
    #[error("{table} record {id:?} has a value in `{column}` that is not a valid {expected}")]
    InvalidValue {
        table: &'static str,
        id: String,
        column: &'static str,
        expected: &'static str,
    },
    #[error("unknown content type: {0:?}")]
    UnknownContentType(String),
    #[error("environment variable {0} must be set")]
    MissingEnv(&'static str),
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

const DEFAULT_LOG_FILTER: &str = "info";

/// `RUST_LOG` when it is set and non-blank, otherwise `info`
pub fn log_filter(rust_log: Option<String>) -> String {
    rust_log
        .filter(|filter| !filter.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string())
}

/// Initialize `pretty_env_logger` for the binaries, defaulting to `info`.
pub fn init_logging() {
    pretty_env_logger::formatted_builder()
        .parse_filters(&log_filter(std::env::var("RUST_LOG").ok()))
        .init();
}

/// log progress at `info` every 64 records, and at `trace` every 8
pub(crate) fn log_progress(idx: usize, what: &str) {
    if idx > 0 {
        if idx & 0x3f == 0 {
            log::info!("{} {} records", what, idx);
        } else if idx & 0x7 == 0 {
            log::trace!("{} {} records", what, idx);
        }
    }
}
