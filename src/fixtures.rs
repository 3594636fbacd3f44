//! Scratch databases seeded with source content.

use crate::schema::ensure_source_tables;
use chrono::{Duration, TimeZone, Utc};
use rusqlite::{params, Connection};

const CITIES: [&str; 6] = ["Marrakech", "Fes", "Chefchaouen", "Essaouira", "Merzouga", "Rabat"];

fn timestamp(offset_days: i64) -> String {
    (Utc.ymd(2024, 1, 1).and_hms(9, 0, 0) + Duration::days(offset_days)).to_rfc3339()
}

pub fn seed(conn: &Connection, experiences: usize, travels: usize, services: usize, posts: usize) {
    ensure_source_tables(conn).unwrap();

    for idx in 0..experiences {
        let city = CITIES[idx % CITIES.len()];
        conn.execute(
            "INSERT INTO Experience (
                id, title, slug, description, image, category, duration, difficulty, groupSize,
                itinerary, highlights, included, notIncluded, price, priceNote, published, featured,
                createdAt, updatedAt
            ) VALUES (?1, ?2, ?3, ?4, ?5, 'adventure', '1 day', 'moderate', '2-12',
                '[{\"time\":\"09:00\",\"activity\":\"Pickup\"}]', '[\"Local guide\"]',
                '[\"Lunch\"]', '[\"Tips\"]', ?6, 'per person', 1, ?7, ?8, ?8)",
            params![
                format!("exp-{}", idx),
                format!("{} Day Trip", city),
                format!("{}-day-trip-{}", city.to_lowercase(), idx),
                format!("Explore {} with a local guide.", city),
                format!("/images/experiences/{}.jpg", idx),
                45.0 + idx as f64,
                idx == 0,
                timestamp(idx as i64),
            ],
        )
        .unwrap();
    }

    for idx in 0..travels {
        conn.execute(
            "INSERT INTO Travel (
                id, title, slug, description, image, category, duration, cities, itinerary,
                highlights, included, notIncluded, price, priceNote, published, featured,
                createdAt, updatedAt
            ) VALUES (?1, ?2, ?3, 'A grand tour.', NULL, 'tour', ?4, ?5, NULL,
                '[\"Medina walks\"]', '[\"Hotels\"]', NULL, ?6, NULL, 1, 0, ?7, ?7)",
            params![
                format!("trv-{}", idx),
                format!("Grand Tour {}", idx + 1),
                format!("grand-tour-{}", idx + 1),
                format!("{} days", 7 + idx),
                serde_json::to_string(&CITIES[..3 + idx % 3]).unwrap(),
                900.0 + 100.0 * idx as f64,
                timestamp(10 + idx as i64),
            ],
        )
        .unwrap();
    }

    for idx in 0..services {
        conn.execute(
            "INSERT INTO Service (
                id, name, slug, description, category, icon, features, pricing,
                published, featured, createdAt, updatedAt
            ) VALUES (?1, ?2, ?3, 'Door to door.', 'transport', 'car',
                '[\"Meet and greet\",\"Air conditioning\"]', '{\"from\":25,\"currency\":\"EUR\"}',
                1, 0, ?4, ?4)",
            params![
                format!("svc-{}", idx),
                if idx == 0 {
                    "Airport Transfer".to_string()
                } else {
                    format!("Private Driver {}", idx)
                },
                format!("service-{}", idx),
                timestamp(20 + idx as i64),
            ],
        )
        .unwrap();
    }

    for idx in 0..posts {
        let tags = match idx % 3 {
            0 => "[\"culture\",\"food\"]",
            1 => "[]",
            _ => "null",
        };
        conn.execute(
            "INSERT INTO BlogPost (
                id, title, slug, excerpt, coverImage, sections, tags, author, readTime,
                published, featured, publishedAt, createdAt, updatedAt
            ) VALUES (?1, ?2, ?3, 'Notes from the road.', ?4, '[]', ?5, 'Youssef', 5,
                ?6, 0, ?7, ?8, ?8)",
            params![
                format!("blog-{}", idx),
                format!("Travel Notes {}", idx + 1),
                format!("travel-notes-{}", idx + 1),
                format!("/images/blog/{}.jpg", idx),
                tags,
                idx % 2 == 0,
                if idx % 2 == 0 {
                    Some(timestamp(40 + idx as i64))
                } else {
                    None
                },
                timestamp(30 + idx as i64),
            ],
        )
        .unwrap();
    }
}

/// An in-memory database with the requested number of rows in each source table.
pub fn seeded(experiences: usize, travels: usize, services: usize, posts: usize) -> Connection {
    let conn = Connection::open_in_memory().unwrap();
    seed(&conn, experiences, travels, services, posts);
    conn
}
