pub mod error;
pub mod providers;
pub mod types;

pub use error::*;
pub use providers::{JsonStore, MemoryStore};
pub use types::*;

use crate::StorageConfig;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Durable list of gallery records. Every save replaces the whole list.
#[async_trait]
pub trait GalleryStore: Send + Sync {
    /// Make sure the backing storage holds a valid (possibly empty) list.
    /// Corrupt contents are reset rather than reported.
    async fn initialize(&self) -> Result<(), StoreError>;

    async fn load_all(&self) -> Result<Vec<GalleryRecord>, StoreError>;

    /// Records whose gallery directory still exists.
    async fn load_valid(&self) -> Result<Vec<GalleryRecord>, StoreError> {
        let mut valid = Vec::new();
        for record in self.load_all().await? {
            if tokio::fs::try_exists(&record.path).await.unwrap_or(false) {
                valid.push(record);
            } else {
                debug!("Dropping record '{}': {:?} no longer exists", record.name, record.path);
            }
        }
        Ok(valid)
    }

    async fn save_all(&self, records: &[GalleryRecord]) -> Result<(), StoreError>;

    fn name(&self) -> &str;
}

pub type DynGalleryStore = Arc<dyn GalleryStore>;

/// File-backed store for the configured roots. Legacy records that only
/// carry a name are resolved against the first root.
pub fn create_store(storage: &StorageConfig) -> DynGalleryStore {
    let mut store = JsonStore::new(&storage.store_file);
    if let Some(root) = storage.roots.first() {
        store = store.with_legacy_root(root);
    }
    Arc::new(store)
}
