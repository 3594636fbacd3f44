//! The unified content model.

use crate::{config::OnConflict, Error};
use chrono::{DateTime, Utc};
use rusqlite::{
    self, params,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
    ToSql, Transaction,
};
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Experience,
    Travel,
    Service,
    Blog,
}

impl ContentType {
    /// All content types, in migration order.
    pub const ALL: [ContentType; 4] = [
        ContentType::Experience,
        ContentType::Travel,
        ContentType::Service,
        ContentType::Blog,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Experience => "experience",
            ContentType::Travel => "travel",
            ContentType::Service => "service",
            ContentType::Blog => "blog",
        }
    }

    /// Experiences and travels can be booked; services and blog posts cannot.
    pub fn bookable(&self) -> bool {
        matches!(self, ContentType::Experience | ContentType::Travel)
    }

    /// the source table this type is migrated from
    pub fn source_table(&self) -> &'static str {
        match self {
            ContentType::Experience => "Experience",
            ContentType::Travel => "Travel",
            ContentType::Service => "Service",
            ContentType::Blog => "BlogPost",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = Error;

    fn from_str(s: &str) -> Result<ContentType, Self::Err> {
        ContentType::ALL
            .iter()
            .copied()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| Error::UnknownContentType(s.to_string()))
    }
}

impl FromSql for ContentType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()
            .and_then(|s| ContentType::from_str(s).map_err(|e| FromSqlError::Other(Box::new(e))))
    }
}

impl ToSql for ContentType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

/// One row of the `ContentItem` table.
///
/// `bookable` is not a field: it is always [`ContentType::bookable`] of `content_type`.
#[derive(Debug, PartialEq, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    pub id: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub price: Option<f64>,
    pub price_note: Option<String>,
    pub duration: Option<String>,
    pub metadata: Map<String, Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

const INSERT: &str = "
    INSERT INTO ContentItem (
        id, type, title, slug, description, image, category,
        published, featured, bookable, price, priceNote, duration,
        metadata, createdAt, updatedAt, publishedAt
    )
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
";

// `type` is never part of the update set
const UPSERT_SUFFIX: &str = "
    ON CONFLICT (id) DO UPDATE SET
        title = excluded.title,
        slug = excluded.slug,
        description = excluded.description,
        image = excluded.image,
        category = excluded.category,
        published = excluded.published,
        featured = excluded.featured,
        price = excluded.price,
        priceNote = excluded.priceNote,
        duration = excluded.duration,
        metadata = excluded.metadata,
        createdAt = excluded.createdAt,
        updatedAt = excluded.updatedAt,
        publishedAt = excluded.publishedAt
    WHERE ContentItem.type = excluded.type
";

impl ContentItem {
    pub fn bookable(&self) -> bool {
        self.content_type.bookable()
    }

    pub fn metadata_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.metadata)?)
    }

    /// Write this item within the given transaction.
    ///
    /// With [`OnConflict::Fail`], an existing row with the same id or `(type, slug)` is an error.
    /// With [`OnConflict::Upsert`], an existing row with the same id and type is overwritten;
    /// an existing row with the same id but a different type is left alone and reported as an
    /// error.
    pub fn insert(&self, tx: &Transaction<'_>, on_conflict: OnConflict) -> Result<(), Error> {
        let metadata = self.metadata_json()?;
        let sql = match on_conflict {
            OnConflict::Fail => INSERT.to_string(),
            OnConflict::Upsert => format!("{}{}", INSERT, UPSERT_SUFFIX),
        };
        let changed = tx.prepare_cached(&sql)?.execute(params![
            self.id,
            self.content_type,
            self.title,
            self.slug,
            self.description,
            self.image,
            self.category,
            self.published,
            self.featured,
            self.bookable(),
            self.price,
            self.price_note,
            self.duration,
            metadata,
            self.created_at,
            self.updated_at,
            self.published_at,
        ])?;
        if changed == 0 {
            // only reachable through the upsert's type guard
            return Err(Error::ContentTypeChanged {
                id: self.id.clone(),
                content_type: self.content_type,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ensure_content_table;
    use rusqlite::Connection;

    fn item(id: &str, content_type: ContentType, slug: &str) -> ContentItem {
        let now = Utc::now();
        ContentItem {
            id: id.into(),
            content_type,
            title: "Sahara Nights".into(),
            slug: slug.into(),
            description: None,
            image: None,
            category: None,
            published: true,
            featured: false,
            price: Some(120.0),
            price_note: None,
            duration: None,
            metadata: Map::new(),
            created_at: now,
            updated_at: now,
            published_at: Some(now),
        }
    }

    #[test]
    fn content_type_round_trips_through_str() {
        for ty in ContentType::ALL.iter() {
            assert_eq!(ty.as_str().parse::<ContentType>().unwrap(), *ty);
        }
        assert!("vehicle".parse::<ContentType>().is_err());
    }

    #[test]
    fn bookable_is_determined_by_type() {
        assert!(ContentType::Experience.bookable());
        assert!(ContentType::Travel.bookable());
        assert!(!ContentType::Service.bookable());
        assert!(!ContentType::Blog.bookable());
    }

    #[test]
    fn serializes_type_and_camel_case() {
        let json = serde_json::to_value(item("e1", ContentType::Blog, "x")).unwrap();
        assert_eq!(json["type"], "blog");
        assert!(json.get("priceNote").is_some());
        assert!(json.get("content_type").is_none());
    }

    #[test]
    fn insert_fails_on_duplicate_id() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_content_table(&conn).unwrap();
        let tx = conn.transaction().unwrap();
        let first = item("e1", ContentType::Experience, "sahara-nights");
        first.insert(&tx, OnConflict::Fail).unwrap();
        assert!(first.insert(&tx, OnConflict::Fail).is_err());
    }

    #[test]
    fn upsert_overwrites_same_type() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_content_table(&conn).unwrap();
        let tx = conn.transaction().unwrap();
        item("e1", ContentType::Experience, "sahara-nights")
            .insert(&tx, OnConflict::Upsert)
            .unwrap();
        let renamed = ContentItem {
            title: "Sahara Nights Deluxe".into(),
            ..item("e1", ContentType::Experience, "sahara-nights")
        };
        renamed.insert(&tx, OnConflict::Upsert).unwrap();

        let title: String = tx
            .query_row("SELECT title FROM ContentItem WHERE id = 'e1'", params![], |row| row.get(0))
            .unwrap();
        assert_eq!(title, "Sahara Nights Deluxe");
    }

    #[test]
    fn upsert_refuses_type_change() {
        let mut conn = Connection::open_in_memory().unwrap();
        ensure_content_table(&conn).unwrap();
        let tx = conn.transaction().unwrap();
        item("e1", ContentType::Experience, "sahara-nights")
            .insert(&tx, OnConflict::Upsert)
            .unwrap();
        assert!(item("e1", ContentType::Blog, "sahara-nights")
            .insert(&tx, OnConflict::Upsert)
            .is_err());
    }
}
