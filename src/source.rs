//! The per-type source records.
//!
//! The source tables were populated from a schema-less document store, so any column may be
//! NULL or hold an unexpected type. Each table is read once into [`RawRecord`]s, which are then
//! validated into typed records. Fields that every record must have are checked here; the
//! mappers never need to guess at defaults.

use crate::{log_progress, Error};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, types::Value as SqlValue, Connection};
use serde_json::Value;

/// A row exactly as stored, keyed by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    table: &'static str,
    id: String,
    columns: Vec<(&'static str, SqlValue)>,
}

impl RawRecord {
    pub fn new(
        table: &'static str,
        id: impl Into<String>,
        columns: Vec<(&'static str, SqlValue)>,
    ) -> Self {
        RawRecord {
            table,
            id: id.into(),
            columns,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, column: &'static str) -> &SqlValue {
        self.columns
            .iter()
            .find(|(name, _)| *name == column)
            .map(|(_, value)| value)
            .unwrap_or(&SqlValue::Null)
    }

    fn invalid(&self, column: &'static str, expected: &'static str) -> Error {
        Error::InvalidValue {
            table: self.table,
            id: self.id.clone(),
            column,
            expected,
        }
    }

    /// optional text; numbers are rendered as text, blank strings are absent
    fn text(&self, column: &'static str) -> Result<Option<String>, Error> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Text(text) if text.trim().is_empty() => Ok(None),
            SqlValue::Text(text) => Ok(Some(text.clone())),
            SqlValue::Integer(i) => Ok(Some(i.to_string())),
            SqlValue::Real(f) => Ok(Some(f.to_string())),
            SqlValue::Blob(_) => Err(self.invalid(column, "text")),
        }
    }

    fn required_text(&self, column: &'static str) -> Result<String, Error> {
        self.text(column)?.ok_or_else(|| Error::MissingField {
            table: self.table,
            id: self.id.clone(),
            field: column,
        })
    }

    fn real(&self, column: &'static str) -> Result<Option<f64>, Error> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(i) => Ok(Some(*i as f64)),
            SqlValue::Real(f) => Ok(Some(*f)),
            SqlValue::Text(text) if text.trim().is_empty() => Ok(None),
            SqlValue::Text(text) => text
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(column, "number")),
            SqlValue::Blob(_) => Err(self.invalid(column, "number")),
        }
    }

    /// booleans are stored as integers; NULL reads as false
    fn flag(&self, column: &'static str) -> Result<bool, Error> {
        match self.get(column) {
            SqlValue::Null => Ok(false),
            SqlValue::Integer(i) => Ok(*i != 0),
            SqlValue::Text(text) => match text.trim() {
                "1" | "true" => Ok(true),
                "0" | "false" | "" => Ok(false),
                _ => Err(self.invalid(column, "boolean")),
            },
            _ => Err(self.invalid(column, "boolean")),
        }
    }

    fn timestamp(&self, column: &'static str) -> Result<Option<DateTime<Utc>>, Error> {
        match self.get(column) {
            SqlValue::Null => Ok(None),
            SqlValue::Integer(millis) => Utc
                .timestamp_millis_opt(*millis)
                .single()
                .map(Some)
                .ok_or_else(|| self.invalid(column, "timestamp")),
            SqlValue::Text(text) if text.trim().is_empty() => Ok(None),
            SqlValue::Text(text) => parse_timestamp(text)
                .map(Some)
                .ok_or_else(|| self.invalid(column, "timestamp")),
            _ => Err(self.invalid(column, "timestamp")),
        }
    }

    fn required_timestamp(&self, column: &'static str) -> Result<DateTime<Utc>, Error> {
        self.timestamp(column)?.ok_or_else(|| Error::MissingField {
            table: self.table,
            id: self.id.clone(),
            field: column,
        })
    }

    /// a JSON text column; NULL reads as `null`
    fn json(&self, column: &'static str) -> Result<Value, Error> {
        match self.get(column) {
            SqlValue::Null => Ok(Value::Null),
            SqlValue::Text(text) if text.trim().is_empty() => Ok(Value::Null),
            SqlValue::Text(text) => {
                serde_json::from_str(text).map_err(|source| Error::MalformedJson {
                    table: self.table,
                    id: self.id.clone(),
                    column,
                    source,
                })
            }
            _ => Err(self.invalid(column, "json")),
        }
    }

    /// a JSON array column; NULL reads as an empty array
    fn json_list(&self, column: &'static str) -> Result<Vec<Value>, Error> {
        match self.json(column)? {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => Ok(items),
            _ => Err(self.invalid(column, "json array")),
        }
    }

    /// any JSON value, kept as stored; NULL reads as an empty array
    fn loose_list(&self, column: &'static str) -> Result<Value, Error> {
        match self.json(column)? {
            Value::Null => Ok(Value::Array(Vec::new())),
            value => Ok(value),
        }
    }

    /// any scalar column as a JSON value, preserving its stored type
    fn scalar(&self, column: &'static str) -> Value {
        sql_to_json(self.get(column))
    }
}

/// convert a stored value into JSON; blobs become arrays of bytes
pub(crate) fn sql_to_json(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::Null,
        SqlValue::Integer(i) => Value::from(*i),
        SqlValue::Real(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        SqlValue::Text(text) => Value::String(text.clone()),
        SqlValue::Blob(bytes) => Value::from(bytes.clone()),
    }
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.with_timezone(&Utc));
    }
    // sqlite stores naive timestamps in UTC: <https://sqlite.org/lang_datefunc.html> section 2
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| DateTime::from_utc(naive, Utc))
}

/// Read every row of a source table.
pub fn read_raw(
    conn: &Connection,
    table: &'static str,
    columns: &'static [&'static str],
) -> Result<Vec<RawRecord>, Error> {
    let mut stmt = conn.prepare(&format!(
        "SELECT id, {} FROM {} ORDER BY createdAt, id",
        columns.join(", "),
        table,
    ))?;
    let records = stmt
        .query_map(params![], |row| {
            let id: String = row.get(0)?;
            let values = columns
                .iter()
                .enumerate()
                .map(|(idx, column)| {
                    row.get::<_, SqlValue>(idx + 1)
                        .map(|value| (*column, value))
                })
                .collect::<Result<Vec<_>, rusqlite::Error>>()?;
            Ok(RawRecord::new(table, id, values))
        })?
        .enumerate()
        .map(|(idx, record)| {
            log_progress(idx, "read");
            record
        })
        .collect::<Result<Vec<_>, rusqlite::Error>>()?;
    log::debug!("read {} rows from {}", records.len(), table);
    Ok(records)
}

/// A source type that can be read from its table and validated.
pub trait SourceRecord: Sized {
    const TABLE: &'static str;
    const COLUMNS: &'static [&'static str];

    fn from_raw(raw: &RawRecord) -> Result<Self, Error>;

    /// Read and validate the whole table. The first invalid row fails the read.
    fn read_all(conn: &Connection) -> Result<Vec<Self>, Error> {
        read_raw(conn, Self::TABLE, Self::COLUMNS)?
            .iter()
            .map(Self::from_raw)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Experience {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub duration: Option<String>,
    pub difficulty: Option<String>,
    pub group_size: Value,
    pub itinerary: Vec<Value>,
    pub highlights: Vec<Value>,
    pub included: Vec<Value>,
    pub not_included: Vec<Value>,
    pub price: Option<f64>,
    pub price_note: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRecord for Experience {
    const TABLE: &'static str = "Experience";
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "slug",
        "description",
        "image",
        "category",
        "duration",
        "difficulty",
        "groupSize",
        "itinerary",
        "highlights",
        "included",
        "notIncluded",
        "price",
        "priceNote",
        "published",
        "featured",
        "createdAt",
        "updatedAt",
    ];

    fn from_raw(raw: &RawRecord) -> Result<Self, Error> {
        Ok(Experience {
            id: raw.id().to_string(),
            title: raw.required_text("title")?,
            slug: raw.required_text("slug")?,
            description: raw.text("description")?,
            image: raw.text("image")?,
            category: raw.text("category")?,
            duration: raw.text("duration")?,
            difficulty: raw.text("difficulty")?,
            group_size: raw.scalar("groupSize"),
            itinerary: raw.json_list("itinerary")?,
            highlights: raw.json_list("highlights")?,
            included: raw.json_list("included")?,
            not_included: raw.json_list("notIncluded")?,
            price: raw.real("price")?,
            price_note: raw.text("priceNote")?,
            published: raw.flag("published")?,
            featured: raw.flag("featured")?,
            created_at: raw.required_timestamp("createdAt")?,
            updated_at: raw.required_timestamp("updatedAt")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Travel {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub duration: Option<String>,
    pub cities: Vec<Value>,
    pub itinerary: Vec<Value>,
    pub highlights: Vec<Value>,
    pub included: Vec<Value>,
    pub not_included: Vec<Value>,
    pub price: Option<f64>,
    pub price_note: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRecord for Travel {
    const TABLE: &'static str = "Travel";
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "slug",
        "description",
        "image",
        "category",
        "duration",
        "cities",
        "itinerary",
        "highlights",
        "included",
        "notIncluded",
        "price",
        "priceNote",
        "published",
        "featured",
        "createdAt",
        "updatedAt",
    ];

    fn from_raw(raw: &RawRecord) -> Result<Self, Error> {
        Ok(Travel {
            id: raw.id().to_string(),
            title: raw.required_text("title")?,
            slug: raw.required_text("slug")?,
            description: raw.text("description")?,
            image: raw.text("image")?,
            category: raw.text("category")?,
            duration: raw.text("duration")?,
            cities: raw.json_list("cities")?,
            itinerary: raw.json_list("itinerary")?,
            highlights: raw.json_list("highlights")?,
            included: raw.json_list("included")?,
            not_included: raw.json_list("notIncluded")?,
            price: raw.real("price")?,
            price_note: raw.text("priceNote")?,
            published: raw.flag("published")?,
            featured: raw.flag("featured")?,
            created_at: raw.required_timestamp("createdAt")?,
            updated_at: raw.required_timestamp("updatedAt")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub icon: Option<String>,
    pub features: Vec<Value>,
    /// free-form pricing structure; `null` if absent
    pub pricing: Value,
    pub published: bool,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRecord for Service {
    const TABLE: &'static str = "Service";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "slug",
        "description",
        "category",
        "icon",
        "features",
        "pricing",
        "published",
        "featured",
        "createdAt",
        "updatedAt",
    ];

    fn from_raw(raw: &RawRecord) -> Result<Self, Error> {
        Ok(Service {
            id: raw.id().to_string(),
            name: raw.required_text("name")?,
            slug: raw.required_text("slug")?,
            description: raw.text("description")?,
            category: raw.text("category")?,
            icon: raw.text("icon")?,
            features: raw.json_list("features")?,
            pricing: raw.json("pricing")?,
            published: raw.flag("published")?,
            featured: raw.flag("featured")?,
            created_at: raw.required_timestamp("createdAt")?,
            updated_at: raw.required_timestamp("updatedAt")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlogPost {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub cover_image: Option<String>,
    pub sections: Vec<Value>,
    /// tags as stored; usually an array of strings, but not guaranteed
    pub tags: Value,
    pub author: Value,
    pub read_time: Value,
    pub published: bool,
    pub featured: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SourceRecord for BlogPost {
    const TABLE: &'static str = "BlogPost";
    const COLUMNS: &'static [&'static str] = &[
        "title",
        "slug",
        "excerpt",
        "coverImage",
        "sections",
        "tags",
        "author",
        "readTime",
        "published",
        "featured",
        "publishedAt",
        "createdAt",
        "updatedAt",
    ];

    fn from_raw(raw: &RawRecord) -> Result<Self, Error> {
        Ok(BlogPost {
            id: raw.id().to_string(),
            title: raw.required_text("title")?,
            slug: raw.required_text("slug")?,
            excerpt: raw.text("excerpt")?,
            cover_image: raw.text("coverImage")?,
            sections: raw.json_list("sections")?,
            tags: raw.loose_list("tags")?,
            author: raw.scalar("author"),
            read_time: raw.scalar("readTime"),
            published: raw.flag("published")?,
            featured: raw.flag("featured")?,
            published_at: raw.timestamp("publishedAt")?,
            created_at: raw.required_timestamp("createdAt")?,
            updated_at: raw.required_timestamp("updatedAt")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn raw(columns: Vec<(&'static str, SqlValue)>) -> RawRecord {
        RawRecord::new("BlogPost", "b1", columns)
    }

    fn text(s: &str) -> SqlValue {
        SqlValue::Text(s.to_string())
    }

    #[test]
    fn reads_seeded_tables() {
        let conn = fixtures::seeded(3, 2, 1, 4);
        assert_eq!(Experience::read_all(&conn).unwrap().len(), 3);
        assert_eq!(Travel::read_all(&conn).unwrap().len(), 2);
        assert_eq!(Service::read_all(&conn).unwrap().len(), 1);
        assert_eq!(BlogPost::read_all(&conn).unwrap().len(), 4);
    }

    #[test]
    fn missing_slug_fails_loudly() {
        let record = raw(vec![
            ("title", text("Fes food tour")),
            ("createdAt", text("2024-01-01T00:00:00Z")),
            ("updatedAt", text("2024-01-01T00:00:00Z")),
        ]);
        match BlogPost::from_raw(&record) {
            Err(Error::MissingField { table, id, field }) => {
                assert_eq!(table, "BlogPost");
                assert_eq!(id, "b1");
                assert_eq!(field, "slug");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn blank_title_is_missing() {
        let record = raw(vec![
            ("title", text("   ")),
            ("slug", text("fes-food-tour")),
            ("createdAt", text("2024-01-01T00:00:00Z")),
            ("updatedAt", text("2024-01-01T00:00:00Z")),
        ]);
        assert!(matches!(
            BlogPost::from_raw(&record),
            Err(Error::MissingField { field: "title", .. })
        ));
    }

    #[test]
    fn malformed_json_names_the_column() {
        let record = raw(vec![
            ("title", text("Fes food tour")),
            ("slug", text("fes-food-tour")),
            ("tags", text("[\"food\"")),
            ("createdAt", text("2024-01-01T00:00:00Z")),
            ("updatedAt", text("2024-01-01T00:00:00Z")),
        ]);
        assert!(matches!(
            BlogPost::from_raw(&record),
            Err(Error::MalformedJson { column: "tags", .. })
        ));
    }

    #[test]
    fn null_lists_and_flags_have_defaults() {
        let record = raw(vec![
            ("title", text("Fes food tour")),
            ("slug", text("fes-food-tour")),
            ("createdAt", text("2024-01-01T00:00:00Z")),
            ("updatedAt", text("2024-01-01T00:00:00Z")),
        ]);
        let post = BlogPost::from_raw(&record).unwrap();
        assert_eq!(post.tags, Value::Array(Vec::new()));
        assert!(post.sections.is_empty());
        assert!(!post.published);
        assert!(!post.featured);
        assert_eq!(post.published_at, None);
    }

    #[test]
    fn non_array_tags_are_kept_as_stored() {
        let record = raw(vec![
            ("title", text("Fes food tour")),
            ("slug", text("fes-food-tour")),
            ("tags", text("\"culture\"")),
            ("createdAt", text("2024-01-01T00:00:00Z")),
            ("updatedAt", text("2024-01-01T00:00:00Z")),
        ]);
        let post = BlogPost::from_raw(&record).unwrap();
        assert_eq!(post.tags, Value::String("culture".into()));
    }

    #[test]
    fn accepts_common_timestamp_encodings() {
        let expect = Utc.ymd(2024, 3, 9).and_hms(10, 30, 0);
        assert_eq!(parse_timestamp("2024-03-09T10:30:00Z"), Some(expect));
        assert_eq!(parse_timestamp("2024-03-09T11:30:00+01:00"), Some(expect));
        assert_eq!(parse_timestamp("2024-03-09 10:30:00"), Some(expect));
        assert_eq!(parse_timestamp("2024-03-09 10:30:00.000"), Some(expect));
        assert_eq!(parse_timestamp("yesterday"), None);

        let record = RawRecord::new(
            "Service",
            "s1",
            vec![("createdAt", SqlValue::Integer(expect.timestamp_millis()))],
        );
        assert_eq!(record.required_timestamp("createdAt").unwrap(), expect);
    }
}
