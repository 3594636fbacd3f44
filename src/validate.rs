//! Post-migration checks.
//!
//! Validation only reads. A failed check is reported, never corrected: by the time it runs the
//! migration has already committed.

use crate::{
    content::ContentType,
    migrate::MigrationStats,
    schema::{count_rows, CONTENT_TABLE},
    Error,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountCheck {
    pub content_type: ContentType,
    pub expected: usize,
    pub actual: usize,
}

impl CountCheck {
    pub fn matches(&self) -> bool {
        self.expected == self.actual
    }
}

/// One migrated item per type, for an operator to eyeball.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Sample {
    pub content_type: ContentType,
    pub id: String,
    pub title: String,
    pub slug: String,
    pub bookable: bool,
    pub metadata_keys: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub counts: Vec<CountCheck>,
    /// rows whose stored `bookable` disagrees with their type
    pub inconsistent_bookable: usize,
    pub samples: Vec<Sample>,
}

impl ValidationReport {
    pub fn mismatches(&self) -> impl Iterator<Item = &CountCheck> {
        self.counts.iter().filter(|check| !check.matches())
    }

    pub fn is_ok(&self) -> bool {
        self.mismatches().next().is_none() && self.inconsistent_bookable == 0
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "validation:")?;
        for check in &self.counts {
            writeln!(
                f,
                "  {:<10} expected {:>5}, found {:>5}  {}",
                check.content_type,
                check.expected,
                check.actual,
                if check.matches() { "ok" } else { "MISMATCH" },
            )?;
        }
        if self.inconsistent_bookable > 0 {
            writeln!(
                f,
                "  {} items have a bookable flag inconsistent with their type",
                self.inconsistent_bookable
            )?;
        }
        writeln!(f, "samples:")?;
        for sample in &self.samples {
            writeln!(
                f,
                "  [{}] {:?} slug={} bookable={} metadata=[{}]",
                sample.content_type,
                sample.title,
                sample.slug,
                sample.bookable,
                sample.metadata_keys.join(", "),
            )?;
        }
        write!(f, "result: {}", if self.is_ok() { "ok" } else { "FAILED" })
    }
}

/// count committed items by type
pub fn content_counts(conn: &Connection) -> Result<HashMap<ContentType, usize>, Error> {
    let mut stmt = conn.prepare("SELECT type, COUNT(*) FROM ContentItem GROUP BY type")?;
    let counts = stmt
        .query_map(params![], |row| {
            Ok((row.get::<_, ContentType>(0)?, row.get::<_, i64>(1)? as usize))
        })?
        .collect::<Result<HashMap<_, _>, rusqlite::Error>>()?;
    Ok(counts)
}

/// Count the rows of every source table.
///
/// This is what a migration into an empty table is expected to produce.
pub fn source_counts(conn: &Connection) -> Result<MigrationStats, Error> {
    let mut stats = MigrationStats::default();
    for ty in ContentType::ALL.iter() {
        stats.set(*ty, count_rows(conn, ty.source_table())?);
    }
    Ok(stats)
}

fn inconsistent_bookable(conn: &Connection) -> Result<usize, Error> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM ContentItem
         WHERE bookable != (type IN ('experience', 'travel'))",
        params![],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

fn sample(conn: &Connection, content_type: ContentType) -> Result<Option<Sample>, Error> {
    let row = conn
        .query_row(
            "SELECT id, title, slug, bookable, metadata FROM ContentItem
             WHERE type = ?1 ORDER BY createdAt, id LIMIT 1",
            params![content_type],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, bool>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;
    let (id, title, slug, bookable, metadata) = match row {
        Some(row) => row,
        None => return Ok(None),
    };
    let metadata: Map<String, Value> = serde_json::from_str(&metadata)?;
    Ok(Some(Sample {
        content_type,
        id,
        title,
        slug,
        bookable,
        metadata_keys: metadata.keys().cloned().collect(),
    }))
}

/// Compare the committed `ContentItem` table against the expected per-type counts.
pub fn validate(conn: &Connection, expected: &MigrationStats) -> Result<ValidationReport, Error> {
    let actual = content_counts(conn)?;
    let counts: Vec<CountCheck> = ContentType::ALL
        .iter()
        .map(|ty| CountCheck {
            content_type: *ty,
            expected: expected.get(*ty),
            actual: actual.get(ty).copied().unwrap_or_default(),
        })
        .collect();
    for check in counts.iter().filter(|check| !check.matches()) {
        log::error!(
            "{} count mismatch: expected {}, found {} in {}",
            check.content_type,
            check.expected,
            check.actual,
            CONTENT_TABLE,
        );
    }

    let inconsistent_bookable = inconsistent_bookable(conn)?;
    if inconsistent_bookable > 0 {
        log::error!(
            "{} items have a bookable flag inconsistent with their type",
            inconsistent_bookable
        );
    }

    let mut samples = Vec::new();
    for ty in ContentType::ALL.iter() {
        match sample(conn, *ty)? {
            Some(sample) => samples.push(sample),
            None => log::debug!("no {} items to sample", ty),
        }
    }

    Ok(ValidationReport {
        counts,
        inconsistent_bookable,
        samples,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fixtures, migrate::{run, MigrationOptions}};

    #[test]
    fn end_to_end_counts_match() {
        let mut conn = fixtures::seeded(3, 2, 1, 4);
        let report = run(&mut conn, &MigrationOptions::default(), None).unwrap();
        let validation = validate(&conn, &report.stats).unwrap();

        assert!(validation.is_ok(), "{}", validation);
        assert_eq!(validation.mismatches().count(), 0);
        assert_eq!(
            validation
                .counts
                .iter()
                .map(|check| (check.content_type, check.actual))
                .collect::<Vec<_>>(),
            vec![
                (ContentType::Experience, 3),
                (ContentType::Travel, 2),
                (ContentType::Service, 1),
                (ContentType::Blog, 4),
            ],
        );
        assert_eq!(source_counts(&conn).unwrap(), report.stats);
    }

    #[test]
    fn samples_show_type_specific_metadata() {
        let mut conn = fixtures::seeded(1, 1, 1, 1);
        let report = run(&mut conn, &MigrationOptions::default(), None).unwrap();
        let validation = validate(&conn, &report.stats).unwrap();
        assert_eq!(validation.samples.len(), 4);

        let service = validation
            .samples
            .iter()
            .find(|sample| sample.content_type == ContentType::Service)
            .unwrap();
        assert_eq!(service.title, "Airport Transfer");
        assert!(!service.bookable);
        assert_eq!(service.metadata_keys, vec!["features", "icon", "pricing"]);

        let experience = &validation.samples[0];
        assert_eq!(experience.content_type, ContentType::Experience);
        assert!(experience.bookable);
        assert!(experience.metadata_keys.contains(&"difficulty".to_string()));
    }

    #[test]
    fn flags_count_mismatch() {
        let mut conn = fixtures::seeded(3, 2, 1, 4);
        let report = run(&mut conn, &MigrationOptions::default(), None).unwrap();
        conn.execute("DELETE FROM ContentItem WHERE id = 'trv-1'", params![])
            .unwrap();

        let validation = validate(&conn, &report.stats).unwrap();
        assert!(!validation.is_ok());
        let mismatches: Vec<_> = validation.mismatches().collect();
        assert_eq!(mismatches.len(), 1);
        assert_eq!(mismatches[0].content_type, ContentType::Travel);
        assert_eq!((mismatches[0].expected, mismatches[0].actual), (2, 1));
    }

    #[test]
    fn dry_run_leaves_nothing_to_validate() {
        let mut conn = fixtures::seeded(3, 2, 1, 4);
        let options = MigrationOptions {
            dry_run: true,
            ..MigrationOptions::default()
        };
        let report = run(&mut conn, &options, None).unwrap();
        let validation = validate(&conn, &report.stats).unwrap();
        assert_eq!(validation.mismatches().count(), 4);
        assert!(validation.samples.is_empty());
    }

    #[test]
    fn flags_inconsistent_bookable() {
        let mut conn = fixtures::seeded(1, 0, 1, 0);
        let report = run(&mut conn, &MigrationOptions::default(), None).unwrap();
        conn.execute("UPDATE ContentItem SET bookable = 1 WHERE type = 'service'", params![])
            .unwrap();

        let validation = validate(&conn, &report.stats).unwrap();
        assert_eq!(validation.inconsistent_bookable, 1);
        assert!(!validation.is_ok());
    }
}
