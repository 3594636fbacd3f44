//! Mapping from each source record to a [`ContentItem`].
//!
//! | source field | `ContentItem` field | notes |
//! | --- | --- | --- |
//! | `Service.name` | `title` | |
//! | `BlogPost.excerpt` | `description` | also kept in metadata |
//! | `BlogPost.coverImage` | `image` | also kept in metadata |
//! | `BlogPost.tags[0]` | `category` | `"general"` unless `tags` is an array starting with a non-blank string |
//! | `BlogPost.publishedAt` | `publishedAt` | `createdAt` if absent, and for every other type |
//!
//! Fields with no common slot go into `metadata` under their original names. Every key a type
//! defines is always present, holding `null` when the source value is absent.
//!
//! These functions are pure: the same record always maps to the same item.

use crate::content::{ContentItem, ContentType};
use crate::source::{BlogPost, Experience, Service, Travel};
use serde_json::{Map, Value};

pub const DEFAULT_BLOG_CATEGORY: &str = "general";

fn metadata<I>(entries: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (&'static str, Value)>,
{
    entries
        .into_iter()
        .map(|(key, value)| (key.to_string(), value))
        .collect()
}

fn opt_string(value: &Option<String>) -> Value {
    value.clone().map(Value::String).unwrap_or(Value::Null)
}

pub fn map_experience(source: &Experience) -> ContentItem {
    ContentItem {
        id: source.id.clone(),
        content_type: ContentType::Experience,
        title: source.title.clone(),
        slug: source.slug.clone(),
        description: source.description.clone(),
        image: source.image.clone(),
        category: source.category.clone(),
        published: source.published,
        featured: source.featured,
        price: source.price,
        price_note: source.price_note.clone(),
        duration: source.duration.clone(),
        metadata: metadata(vec![
            ("difficulty", opt_string(&source.difficulty)),
            ("groupSize", source.group_size.clone()),
            ("itinerary", Value::Array(source.itinerary.clone())),
            ("highlights", Value::Array(source.highlights.clone())),
            ("included", Value::Array(source.included.clone())),
            ("notIncluded", Value::Array(source.not_included.clone())),
        ]),
        created_at: source.created_at,
        updated_at: source.updated_at,
        published_at: Some(source.created_at),
    }
}

pub fn map_travel(source: &Travel) -> ContentItem {
    ContentItem {
        id: source.id.clone(),
        content_type: ContentType::Travel,
        title: source.title.clone(),
        slug: source.slug.clone(),
        description: source.description.clone(),
        image: source.image.clone(),
        category: source.category.clone(),
        published: source.published,
        featured: source.featured,
        price: source.price,
        price_note: source.price_note.clone(),
        duration: source.duration.clone(),
        metadata: metadata(vec![
            ("cities", Value::Array(source.cities.clone())),
            ("itinerary", Value::Array(source.itinerary.clone())),
            ("highlights", Value::Array(source.highlights.clone())),
            ("included", Value::Array(source.included.clone())),
            ("notIncluded", Value::Array(source.not_included.clone())),
        ]),
        created_at: source.created_at,
        updated_at: source.updated_at,
        published_at: Some(source.created_at),
    }
}

/// Services have no image, price or duration; their pricing lives only in metadata.
pub fn map_service(source: &Service) -> ContentItem {
    ContentItem {
        id: source.id.clone(),
        content_type: ContentType::Service,
        title: source.name.clone(),
        slug: source.slug.clone(),
        description: source.description.clone(),
        image: None,
        category: source.category.clone(),
        published: source.published,
        featured: source.featured,
        price: None,
        price_note: None,
        duration: None,
        metadata: metadata(vec![
            ("icon", opt_string(&source.icon)),
            ("features", Value::Array(source.features.clone())),
            ("pricing", source.pricing.clone()),
        ]),
        created_at: source.created_at,
        updated_at: source.updated_at,
        published_at: Some(source.created_at),
    }
}

/// The first tag, if `tags` is an array whose first element is a non-blank string.
pub fn blog_category(tags: &Value) -> String {
    tags.as_array()
        .and_then(|tags| tags.first())
        .and_then(Value::as_str)
        .filter(|tag| !tag.trim().is_empty())
        .unwrap_or(DEFAULT_BLOG_CATEGORY)
        .to_string()
}

pub fn map_blog_post(source: &BlogPost) -> ContentItem {
    ContentItem {
        id: source.id.clone(),
        content_type: ContentType::Blog,
        title: source.title.clone(),
        slug: source.slug.clone(),
        description: source.excerpt.clone(),
        image: source.cover_image.clone(),
        category: Some(blog_category(&source.tags)),
        published: source.published,
        featured: source.featured,
        price: None,
        price_note: None,
        duration: None,
        metadata: metadata(vec![
            ("excerpt", opt_string(&source.excerpt)),
            ("coverImage", opt_string(&source.cover_image)),
            ("sections", Value::Array(source.sections.clone())),
            ("tags", source.tags.clone()),
            ("author", source.author.clone()),
            ("readTime", source.read_time.clone()),
        ]),
        created_at: source.created_at,
        updated_at: source.updated_at,
        published_at: Some(source.published_at.unwrap_or(source.created_at)),
    }
}
