use anyhow::{Context, Result};
use std::time::Duration;

/// Connection settings for one run, read from the environment once at
/// startup. `.env` files are honored via dotenvy in `main`.
#[derive(Debug, Clone)]
pub struct Config {
    pub source_url: String,
    pub warehouse_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let source_url = std::env::var("SOURCE_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/oltp".to_string());
        let warehouse_url = std::env::var("WAREHOUSE_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/olap".to_string());

        let max_connections = match std::env::var("ETL_MAX_CONNECTIONS") {
            Ok(v) => v
                .parse()
                .context("ETL_MAX_CONNECTIONS must be a positive integer")?,
            Err(_) => 5,
        };

        let acquire_timeout_secs: u64 = match std::env::var("ETL_ACQUIRE_TIMEOUT_SECS") {
            Ok(v) => v
                .parse()
                .context("ETL_ACQUIRE_TIMEOUT_SECS must be a positive integer")?,
            Err(_) => 30,
        };

        Ok(Self {
            source_url,
            warehouse_url,
            max_connections,
            acquire_timeout: Duration::from_secs(acquire_timeout_secs),
        })
    }
}
