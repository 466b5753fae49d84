use anyhow::{Context, Error};
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use crate::config::Config;

pub struct AppContext {
    pub db: sqlx::PgPool,
}

impl AppContext {
    pub async fn new(config: &Config) -> Result<Self, Error> {
        let options = PgPoolOptions::new().max_connections(config.max_pg_connections);
        let db = options
            .connect(&config.database_url)
            .await
            .context("failed to connect to the trips database")?;

        Ok(Self { db })
    }

    pub async fn run_migrations(&self) -> Result<(), Error> {
        info!("Running migrations");
        sqlx::migrate!("./migrations")
            .run(&self.db)
            .await
            .context("failed to run migrations")?;
        Ok(())
    }
}
