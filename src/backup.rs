//! Backups of the source tables, taken before anything is written.
//!
//! The preferred backup is a native SQL dump made with the `sqlite3` command line tool. When
//! that is unavailable or fails, the tables are read through the open connection and written
//! as a single JSON document instead. A failed backup is never an error: it is logged, and the
//! caller decides whether to continue.

use crate::{schema::SOURCE_TABLES, source::sql_to_json, Error};
use chrono::{DateTime, SecondsFormat, Utc};
use lazy_static::lazy_static;
use regex::Regex;
use rusqlite::{params, types::Value as SqlValue, Connection};
use serde_json::{Map, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

lazy_static! {
    static ref TIMESTAMP_SEPARATORS: Regex = Regex::new(r"[:.]").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupConfig {
    pub database_path: PathBuf,
    pub backup_dir: PathBuf,
    pub sqlite3_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Sql(PathBuf),
    Json(PathBuf),
    Failed,
}

impl BackupOutcome {
    pub fn path(&self) -> Option<&Path> {
        match self {
            BackupOutcome::Sql(path) | BackupOutcome::Json(path) => Some(path),
            BackupOutcome::Failed => None,
        }
    }
}

/// a filesystem-safe rendering of an RFC 3339 timestamp, i.e. `2026-10-16T09-30-00-123Z`
pub fn backup_stamp(at: DateTime<Utc>) -> String {
    TIMESTAMP_SEPARATORS
        .replace_all(&at.to_rfc3339_opts(SecondsFormat::Millis, true), "-")
        .into_owned()
}

/// Back up the source tables into `config.backup_dir`.
pub fn write_backup(conn: &Connection, config: &BackupConfig) -> BackupOutcome {
    let stamp = backup_stamp(Utc::now());
    if let Err(err) = std::fs::create_dir_all(&config.backup_dir) {
        log::warn!(
            "could not create backup directory {}: {}",
            config.backup_dir.display(),
            err
        );
        return BackupOutcome::Failed;
    }

    let sql_path = config.backup_dir.join(format!("backup-{}.sql", stamp));
    match native_dump(config, &sql_path) {
        Ok(()) => {
            log::info!("wrote native backup to {}", sql_path.display());
            return BackupOutcome::Sql(sql_path);
        }
        Err(err) => {
            log::warn!("native dump failed, falling back to json: {:#}", err);
            if sql_path.exists() {
                if let Err(err) = std::fs::remove_file(&sql_path) {
                    log::warn!("could not remove partial dump {}: {}", sql_path.display(), err);
                }
            }
        }
    }

    let json_path = config.backup_dir.join(format!("backup-{}.json", stamp));
    match json_dump(conn, &json_path) {
        Ok(rows) => {
            log::info!("wrote json backup of {} rows to {}", rows, json_path.display());
            BackupOutcome::Json(json_path)
        }
        Err(err) => {
            log::warn!("json backup failed; continuing without a backup: {}", err);
            BackupOutcome::Failed
        }
    }
}

fn native_dump(config: &BackupConfig, out: &Path) -> anyhow::Result<()> {
    let file = File::create(out)?;
    let mut command = Command::new(&config.sqlite3_path);
    command
        .arg("-readonly")
        .arg(&config.database_path)
        .args(SOURCE_TABLES.iter().map(|table| format!(".dump {}", table)))
        .stdin(Stdio::null())
        .stdout(Stdio::from(file))
        .stderr(Stdio::piped());
    log::debug!("running {:?}", command);

    let output = command.output().map_err(|err| {
        anyhow::anyhow!("could not run {}: {}", config.sqlite3_path.display(), err)
    })?;
    if !output.status.success() {
        anyhow::bail!(
            "{} exited with {}: {}",
            config.sqlite3_path.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim(),
        );
    }
    Ok(())
}

/// read every row of every source table into one JSON object keyed by table name
fn dump_tables(conn: &Connection) -> Result<(Map<String, Value>, usize), Error> {
    let mut tables = Map::new();
    let mut total = 0;
    for table in SOURCE_TABLES.iter() {
        let mut stmt = conn.prepare(&format!("SELECT * FROM {}", table))?;
        let names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(params![], |row| {
                let mut object = Map::new();
                for (idx, name) in names.iter().enumerate() {
                    object.insert(name.clone(), sql_to_json(&row.get::<_, SqlValue>(idx)?));
                }
                Ok(Value::Object(object))
            })?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        log::debug!("backing up {} rows of {}", rows.len(), table);
        total += rows.len();
        tables.insert(table.to_string(), Value::Array(rows));
    }
    Ok((tables, total))
}

fn json_dump(conn: &Connection, out: &Path) -> Result<usize, Error> {
    let (tables, total) = dump_tables(conn)?;
    let mut writer = BufWriter::new(File::create(out)?);
    serde_json::to_writer_pretty(&mut writer, &tables)?;
    writer.flush()?;
    Ok(total)
}
