//! The migration itself.
//!
//! All four content types are read, mapped and inserted inside a single transaction. The
//! transaction is committed only for a live run which completed without error; a dry run
//! explicitly rolls it back once the counts are known.

use crate::{
    backup::{write_backup, BackupConfig, BackupOutcome},
    config::OnConflict,
    content::{ContentItem, ContentType},
    log_progress, mapping,
    schema::ensure_content_table,
    source::{BlogPost, Experience, Service, SourceRecord, Travel},
    Error,
};
use rusqlite::{Connection, Transaction};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationOptions {
    pub dry_run: bool,
    pub on_conflict: OnConflict,
}

/// Number of items migrated per content type.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStats {
    pub experiences: usize,
    pub travels: usize,
    pub services: usize,
    pub blog_posts: usize,
    pub total: usize,
}

impl MigrationStats {
    pub fn get(&self, content_type: ContentType) -> usize {
        match content_type {
            ContentType::Experience => self.experiences,
            ContentType::Travel => self.travels,
            ContentType::Service => self.services,
            ContentType::Blog => self.blog_posts,
        }
    }

    pub fn set(&mut self, content_type: ContentType, count: usize) {
        match content_type {
            ContentType::Experience => self.experiences = count,
            ContentType::Travel => self.travels = count,
            ContentType::Service => self.services = count,
            ContentType::Blog => self.blog_posts = count,
        }
        self.total = ContentType::ALL.iter().map(|ty| self.get(*ty)).sum();
    }
}

impl fmt::Display for MigrationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "  experiences: {:>5}", self.experiences)?;
        writeln!(f, "  travels:     {:>5}", self.travels)?;
        writeln!(f, "  services:    {:>5}", self.services)?;
        writeln!(f, "  blog posts:  {:>5}", self.blog_posts)?;
        write!(f, "  total:       {:>5}", self.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub dry_run: bool,
    pub stats: MigrationStats,
    /// `None` when no backup was attempted
    pub backup: Option<BackupOutcome>,
}

impl fmt::Display for MigrationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.dry_run {
            writeln!(f, "dry run: nothing was committed. would have migrated:")?;
        } else {
            writeln!(f, "migrated:")?;
        }
        write!(f, "{}", self.stats)?;
        match self.backup.as_ref().map(BackupOutcome::path) {
            Some(Some(path)) => write!(f, "\nbackup: {}", path.display()),
            Some(None) => write!(f, "\nbackup: FAILED"),
            None => Ok(()),
        }
    }
}

/// Read, map and insert every record of one source type within `tx`.
fn migrate_type<S, M>(
    tx: &Transaction<'_>,
    content_type: ContentType,
    map: M,
    on_conflict: OnConflict,
) -> Result<usize, Error>
where
    S: SourceRecord,
    M: Fn(&S) -> ContentItem,
{
    log::info!("migrating {} records from {}", content_type, S::TABLE);
    let records = S::read_all(tx)?;
    for (idx, record) in records.iter().enumerate() {
        let item = map(record);
        item.insert(tx, on_conflict).map_err(|err| {
            log::error!("failed to insert {} {:?}: {}", content_type, item.id, err);
            err
        })?;
        log::info!("migrated {} {:?} ({})", content_type, item.title, item.slug);
        log_progress(idx + 1, "migrated");
    }
    Ok(records.len())
}

/// Migrate all content types within `tx`, without committing.
pub fn migrate_all(tx: &Transaction<'_>, on_conflict: OnConflict) -> Result<MigrationStats, Error> {
    let mut stats = MigrationStats::default();
    stats.set(
        ContentType::Experience,
        migrate_type::<Experience, _>(
            tx,
            ContentType::Experience,
            mapping::map_experience,
            on_conflict,
        )?,
    );
    stats.set(
        ContentType::Travel,
        migrate_type::<Travel, _>(tx, ContentType::Travel, mapping::map_travel, on_conflict)?,
    );
    stats.set(
        ContentType::Service,
        migrate_type::<Service, _>(tx, ContentType::Service, mapping::map_service, on_conflict)?,
    );
    stats.set(
        ContentType::Blog,
        migrate_type::<BlogPost, _>(tx, ContentType::Blog, mapping::map_blog_post, on_conflict)?,
    );
    Ok(stats)
}

/// Run the migration.
///
/// A backup is written first when `backup` is given and this is not a dry run. Any error while
/// reading, mapping or inserting leaves the destination table exactly as it was.
pub fn run(
    conn: &mut Connection,
    options: &MigrationOptions,
    backup: Option<&BackupConfig>,
) -> Result<MigrationReport, Error> {
    let backup = match backup {
        Some(config) if !options.dry_run => {
            log::info!("backing up source tables");
            Some(write_backup(conn, config))
        }
        Some(_) => {
            log::info!("dry run: skipping backup");
            None
        }
        None => None,
    };

    ensure_content_table(conn)?;

    let tx = conn.transaction()?;
    // on error, `tx` is dropped here, which rolls it back
    let stats = migrate_all(&tx, options.on_conflict)?;

    if options.dry_run {
        tx.rollback()?;
        log::info!("dry run: rolled back {} items", stats.total);
    } else {
        tx.commit()?;
        log::info!("committed {} items", stats.total);
    }

    Ok(MigrationReport {
        dry_run: options.dry_run,
        stats,
        backup,
    })
}
