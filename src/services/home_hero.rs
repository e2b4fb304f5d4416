use sqlx::PgPool;

use crate::{
    error::{AppError, AppResult},
    models::{HomeHero, UpdateHomeHero, HOME_HERO_ID},
};

pub struct HomeHeroService {
    db: PgPool,
}

impl HomeHeroService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// The homepage hero row, created with defaults on first access.
    ///
    /// Never fails: if the table is missing or the database is unreachable the
    /// built-in defaults are returned instead.
    pub async fn get_solo(&self) -> HomeHero {
        match self.fetch_or_create().await {
            Ok(hero) => hero,
            Err(e) => {
                tracing::warn!("Falling back to default home hero: {}", e);
                HomeHero::default()
            }
        }
    }

    pub async fn update(&self, update: &UpdateHomeHero) -> AppResult<HomeHero> {
        if update.title.trim().is_empty() || update.primary_button_url.trim().is_empty() {
            return Err(AppError::Validation(
                "Title and primary button URL are required".to_string(),
            ));
        }

        let hero: HomeHero = sqlx::query_as(
            r#"
            INSERT INTO home_hero
                (id, title, subtitle, primary_button_label, primary_button_url,
                 secondary_button_label, secondary_button_url, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW())
            ON CONFLICT (id)
            DO UPDATE SET title = $2, subtitle = $3, primary_button_label = $4, primary_button_url = $5,
                          secondary_button_label = $6, secondary_button_url = $7, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(HOME_HERO_ID)
        .bind(update.title.trim())
        .bind(update.subtitle.trim())
        .bind(update.primary_button_label.trim())
        .bind(update.primary_button_url.trim())
        .bind(&update.secondary_button_label)
        .bind(&update.secondary_button_url)
        .fetch_one(&self.db)
        .await?;

        Ok(hero)
    }

    async fn fetch_or_create(&self) -> AppResult<HomeHero> {
        sqlx::query("INSERT INTO home_hero (id) VALUES ($1) ON CONFLICT (id) DO NOTHING")
            .bind(HOME_HERO_ID)
            .execute(&self.db)
            .await?;

        let hero: HomeHero = sqlx::query_as("SELECT * FROM home_hero WHERE id = $1")
            .bind(HOME_HERO_ID)
            .fetch_one(&self.db)
            .await?;

        Ok(hero)
    }
}
