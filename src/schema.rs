//! Table definitions.
//!
//! The destination table is created on demand by the migration. The source tables are owned
//! by the website; their definitions here document the shape this crate reads, and are used
//! to build scratch databases.

use rusqlite::{params, Connection};

/// The four source tables, in migration order.
pub const SOURCE_TABLES: [&str; 4] = ["Experience", "Travel", "Service", "BlogPost"];

pub const CONTENT_TABLE: &str = "ContentItem";

const CONTENT_ITEM_DDL: &str = "
    CREATE TABLE IF NOT EXISTS ContentItem (
        id          TEXT PRIMARY KEY NOT NULL,
        type        TEXT NOT NULL CHECK (type IN ('experience', 'travel', 'service', 'blog')),
        title       TEXT NOT NULL,
        slug        TEXT NOT NULL,
        description TEXT,
        image       TEXT,
        category    TEXT,
        published   INTEGER NOT NULL DEFAULT 0,
        featured    INTEGER NOT NULL DEFAULT 0,
        bookable    INTEGER NOT NULL DEFAULT 0,
        price       REAL,
        priceNote   TEXT,
        duration    TEXT,
        metadata    TEXT NOT NULL DEFAULT '{}',
        createdAt   TEXT NOT NULL,
        updatedAt   TEXT NOT NULL,
        publishedAt TEXT,
        UNIQUE (type, slug)
    );
    CREATE INDEX IF NOT EXISTS ContentItem_type_published_idx ON ContentItem (type, published);
";

const SOURCE_DDL: &str = "
    CREATE TABLE IF NOT EXISTS Experience (
        id          TEXT PRIMARY KEY NOT NULL,
        title       TEXT,
        slug        TEXT,
        description TEXT,
        image       TEXT,
        category    TEXT,
        duration    TEXT,
        difficulty  TEXT,
        groupSize   TEXT,
        itinerary   TEXT,
        highlights  TEXT,
        included    TEXT,
        notIncluded TEXT,
        price       REAL,
        priceNote   TEXT,
        published   INTEGER,
        featured    INTEGER,
        createdAt   TEXT,
        updatedAt   TEXT
    );
    CREATE TABLE IF NOT EXISTS Travel (
        id          TEXT PRIMARY KEY NOT NULL,
        title       TEXT,
        slug        TEXT,
        description TEXT,
        image       TEXT,
        category    TEXT,
        duration    TEXT,
        cities      TEXT,
        itinerary   TEXT,
        highlights  TEXT,
        included    TEXT,
        notIncluded TEXT,
        price       REAL,
        priceNote   TEXT,
        published   INTEGER,
        featured    INTEGER,
        createdAt   TEXT,
        updatedAt   TEXT
    );
    CREATE TABLE IF NOT EXISTS Service (
        id          TEXT PRIMARY KEY NOT NULL,
        name        TEXT,
        slug        TEXT,
        description TEXT,
        category    TEXT,
        icon        TEXT,
        features    TEXT,
        pricing     TEXT,
        published   INTEGER,
        featured    INTEGER,
        createdAt   TEXT,
        updatedAt   TEXT
    );
    CREATE TABLE IF NOT EXISTS BlogPost (
        id          TEXT PRIMARY KEY NOT NULL,
        title       TEXT,
        slug        TEXT,
        excerpt     TEXT,
        coverImage  TEXT,
        sections    TEXT,
        tags        TEXT,
        author      TEXT,
        readTime    TEXT,
        published   INTEGER,
        featured    INTEGER,
        publishedAt TEXT,
        createdAt   TEXT,
        updatedAt   TEXT
    );
";

pub fn ensure_content_table(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(CONTENT_ITEM_DDL)
}

pub fn ensure_source_tables(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SOURCE_DDL)
}

/// count the rows of a table known to this crate
///
/// `table` is interpolated into the query, so it must come from [`SOURCE_TABLES`] or be
/// [`CONTENT_TABLE`].
pub(crate) fn count_rows(conn: &Connection, table: &str) -> Result<usize, rusqlite::Error> {
    debug_assert!(table == CONTENT_TABLE || SOURCE_TABLES.contains(&table));
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", table),
        params![],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        ensure_source_tables(&conn).unwrap();
        ensure_content_table(&conn).unwrap();
        ensure_source_tables(&conn).unwrap();
        ensure_content_table(&conn).unwrap();

        for table in SOURCE_TABLES.iter().chain(std::iter::once(&CONTENT_TABLE)) {
            assert_eq!(count_rows(&conn, table).unwrap(), 0);
        }
    }
}
