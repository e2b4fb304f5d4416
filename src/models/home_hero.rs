use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Primary key of the only row in `home_hero`.
pub const HOME_HERO_ID: i32 = 1;

pub const DEFAULT_TITLE: &str = "Premium Men's Wear Collection";
pub const DEFAULT_SUBTITLE: &str = "Discover the latest styles and timeless classics";
pub const DEFAULT_PRIMARY_BUTTON_LABEL: &str = "Shop the Collection";
pub const DEFAULT_PRIMARY_BUTTON_URL: &str = "/shop/";

/// Homepage banner content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct HomeHero {
    pub id: i32,
    pub title: String,
    pub subtitle: String,
    pub primary_button_label: String,
    pub primary_button_url: String,
    pub secondary_button_label: Option<String>,
    pub secondary_button_url: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl Default for HomeHero {
    fn default() -> Self {
        Self {
            id: HOME_HERO_ID,
            title: DEFAULT_TITLE.to_string(),
            subtitle: DEFAULT_SUBTITLE.to_string(),
            primary_button_label: DEFAULT_PRIMARY_BUTTON_LABEL.to_string(),
            primary_button_url: DEFAULT_PRIMARY_BUTTON_URL.to_string(),
            secondary_button_label: None,
            secondary_button_url: None,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateHomeHero {
    pub title: String,
    pub subtitle: String,
    pub primary_button_label: String,
    pub primary_button_url: String,
    pub secondary_button_label: Option<String>,
    pub secondary_button_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_hero_content() {
        let hero = HomeHero::default();
        assert_eq!(hero.id, HOME_HERO_ID);
        assert_eq!(hero.title, "Premium Men's Wear Collection");
        assert_eq!(hero.primary_button_url, "/shop/");
        assert_eq!(hero.secondary_button_label, None);
        assert_eq!(hero.secondary_button_url, None);
    }
}
