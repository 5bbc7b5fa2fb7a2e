use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::config::Config;

async fn connect(url: &str, config: &Config) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(url)
        .await
        .with_context(|| format!("failed to connect to {}", url))
}

pub async fn connect_source(config: &Config) -> Result<PgPool> {
    connect(&config.source_url, config).await
}

/// Connects to the warehouse and brings its star schema up to date.
pub async fn connect_warehouse(config: &Config) -> Result<PgPool> {
    let pool = connect(&config.warehouse_url, config).await?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run warehouse migrations")?;

    Ok(pool)
}
