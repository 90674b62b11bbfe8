use std::sync::Arc;

use tracing::info;

use super::{
    config::Config,
    error::ConfigError,
    storage::{GarageStore, ObjectStore},
};

/// Read-only after startup, shared by every handler.
pub struct AppState {
    pub config: Config,
    pub storage: Option<Arc<dyn ObjectStore>>,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>, ConfigError> {
        let storage = match &config.storage {
            Some(storage_config) => {
                let store = GarageStore::initialize(storage_config).await?;
                Some(Arc::new(store) as Arc<dyn ObjectStore>)
            }
            None => {
                info!("Persistence disabled");
                None
            }
        };

        Ok(Self::with_storage(config, storage))
    }

    pub fn with_storage(config: Config, storage: Option<Arc<dyn ObjectStore>>) -> Arc<Self> {
        Arc::new(Self { config, storage })
    }
}
