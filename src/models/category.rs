use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
}

/// Width of the `slug` columns.
pub const SLUG_MAX_LEN: usize = 50;

/// Lowercase ASCII slug: alphanumerics kept, runs of anything else collapse
/// to a single hyphen, no leading or trailing hyphen.
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_hyphen = false;

    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else if c == '\'' {
            continue;
        } else {
            pending_hyphen = true;
        }
    }

    slug
}

/// Cuts a slug to `SLUG_MAX_LEN` without leaving a trailing hyphen.
pub fn cap_slug(mut slug: String) -> String {
    if slug.len() > SLUG_MAX_LEN {
        slug.truncate(SLUG_MAX_LEN);
        let kept = slug.trim_end_matches('-').len();
        slug.truncate(kept);
    }
    slug
}
