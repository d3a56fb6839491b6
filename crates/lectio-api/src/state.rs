//! Application state.

use std::sync::Arc;

use lectio_storage::{
    DeliveryConfig, ManifestCache, ObjectReader, StoreClient, StoreConfig, UrlSigner,
};

use crate::catalog::{Catalog, StaticCatalog};
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub storage: Arc<StoreClient>,
    /// Signing seam used by manifest assembly. Points at `storage` in
    /// production; tests swap in a fake.
    pub signer: Arc<dyn UrlSigner>,
    /// Read seam used by the streaming and delivery handlers. Also
    /// points at `storage` in production.
    pub reader: Arc<dyn ObjectReader>,
    pub catalog: Arc<dyn Catalog>,
    pub delivery: DeliveryConfig,
    pub manifest_cache: Option<Arc<ManifestCache>>,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        let storage = Arc::new(StoreClient::new(StoreConfig::from_env()?).await?);

        let catalog: Arc<dyn Catalog> = match &config.catalog_path {
            Some(path) => Arc::new(StaticCatalog::from_file(path)?),
            None => Arc::new(StaticCatalog::empty()),
        };

        let delivery = DeliveryConfig::from_env();
        let manifest_cache = delivery
            .cache_enabled
            .then(|| Arc::new(ManifestCache::new(delivery.effective_cache_ttl())));

        Ok(Self {
            config,
            signer: Arc::clone(&storage) as Arc<dyn UrlSigner>,
            reader: Arc::clone(&storage) as Arc<dyn ObjectReader>,
            storage,
            catalog,
            delivery,
            manifest_cache,
        })
    }
}
