use std::sync::Arc;

use sea_orm::{ConnectOptions, Database};
use sqlx::postgres::PgPool;

use crate::config::Config;
use crate::services::{ExecutorConfig, HttpExecutor, SendService};
use crate::storage::{DatabaseStorage, Storage};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub sender: SendService,
    pub config: Config,
}

impl AppState {
    /// Connect to PostgreSQL, run migrations and wire the services
    pub async fn new(config: Config) -> Result<Self, AppStateError> {
        // SQLx pool for migrations only
        let pg_pool = PgPool::connect(&config.database_url)
            .await
            .map_err(|e| AppStateError::Postgres(e.to_string()))?;

        sqlx::migrate!("./migrations")
            .run(&pg_pool)
            .await
            .map_err(|e| AppStateError::Migration(e.to_string()))?;
        pg_pool.close().await;

        let mut opt = ConnectOptions::new(&config.database_url);
        opt.max_connections(100)
            .min_connections(5)
            .sqlx_logging(true);

        let db = Database::connect(opt)
            .await
            .map_err(|e| AppStateError::Postgres(e.to_string()))?;

        Self::with_storage(config, Arc::new(DatabaseStorage::new(db)))
    }

    /// Build state over any storage backend (used by tests)
    pub fn with_storage(config: Config, storage: Arc<dyn Storage>) -> Result<Self, AppStateError> {
        let executor = HttpExecutor::new(ExecutorConfig {
            timeout: config.request_timeout,
        })
        .map_err(|e| AppStateError::HttpClient(e.to_string()))?;
        let sender = SendService::new(storage.clone(), executor, config.rewrite_loopback_host);

        Ok(Self {
            storage,
            sender,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppStateError {
    #[error("PostgreSQL connection error: {0}")]
    Postgres(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}
