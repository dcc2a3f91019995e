use std::sync::Arc;

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;
use crate::users::repo::PgUserStore;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        Self::connect(config).await
    }

    pub async fn connect(config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let db = PgPoolOptions::new()
            .max_connections(config.db.max_connections)
            .acquire_timeout(config.db.query_timeout())
            .connect(&config.database_url)
            .await
            .context("connect to database")?;
        Ok(Self { db, config })
    }

    /// Applies the bundled schema migrations.
    pub async fn migrate(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("run migrations")?;
        Ok(())
    }

    pub fn user_store(&self) -> PgUserStore {
        PgUserStore::new(self.db.clone()).with_timeout(self.config.db.query_timeout())
    }
}
