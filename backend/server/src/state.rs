use std::sync::Arc;

use store::{MaintenanceResult, SqliteStore};
use tracing::info;

use super::config::Config;

pub struct AppState {
    pub config: Config,
    pub store: Arc<SqliteStore>,
}

impl AppState {
    pub async fn new(config: Config) -> MaintenanceResult<Arc<Self>> {
        info!("Connecting to {}", config.database_url);
        let store = SqliteStore::connect(&config.database_url, config.max_connections).await?;

        Ok(Self::with_store(config, store))
    }

    pub fn with_store(config: Config, store: SqliteStore) -> Arc<Self> {
        Arc::new(Self {
            config,
            store: Arc::new(store),
        })
    }
}
