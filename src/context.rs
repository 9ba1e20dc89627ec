use std::sync::Arc;

use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{config::Config, storage::ImageStore};

/// Shared handles every operation receives explicitly.
#[derive(Clone)]
pub struct Context {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub images: Arc<ImageStore>,
}

impl Context {
    pub fn new(pool: PgPool, config: Config) -> Self {
        let images = ImageStore::new(config.media_root.clone(), config.media_url.clone());

        Self {
            pool,
            config: Arc::new(config),
            images: Arc::new(images),
        }
    }

    pub async fn connect(config: Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect(&config.database_url)
            .await?;

        Ok(Self::new(pool, config))
    }

    /// Pool that only connects on first use; handy when most requests never reach the store.
    pub fn lazy(config: Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .connect_lazy(&config.database_url)?;

        Ok(Self::new(pool, config))
    }
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
