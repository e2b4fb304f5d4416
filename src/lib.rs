pub mod config;
pub mod error;
pub mod models;
pub mod services;

use std::sync::Arc;

use config::Config;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
}
