//! Database connection management with SQLx

use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::database::memory::InMemoryStore;
use crate::database::postgres::PgStore;
use crate::database::store::BrokerageStore;
use crate::error::ServiceError;

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// `None` selects the in-memory store
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            database_url: None,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            database_url: std::env::var("DATABASE_URL").ok().filter(|url| !url.trim().is_empty()),
            max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_connections),
            acquire_timeout: defaults.acquire_timeout,
        }
    }
}

/// Create a PostgreSQL pool and bring the schema up to date
pub async fn connect_postgres(config: &DatabaseConfig, database_url: &str) -> Result<PgPool, ServiceError> {
    info!("Creating PostgreSQL connection pool with {} max connections", config.max_connections);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .connect(database_url)
        .await
        .map_err(|e| ServiceError::DatabaseError(format!("Failed to create PostgreSQL pool: {}", e)))?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    info!("PostgreSQL connection pool created successfully");
    Ok(pool)
}

/// Open the store selected by the configuration
pub async fn initialize_store(config: &DatabaseConfig) -> Result<Arc<dyn BrokerageStore>, ServiceError> {
    match &config.database_url {
        Some(url) => {
            let pool = connect_postgres(config, url).await?;
            Ok(Arc::new(PgStore::new(pool)))
        }
        None => {
            info!("DATABASE_URL not set, using the in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}
