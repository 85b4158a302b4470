use crate::store::{GalleryRecord, GalleryStore, StoreError};
use async_trait::async_trait;
use tokio::sync::Mutex;

/// In-process store for embedding and tests. Nothing survives the process.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<Vec<GalleryRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<GalleryRecord>) -> Self {
        Self {
            records: Mutex::new(records),
        }
    }

    pub async fn snapshot(&self) -> Vec<GalleryRecord> {
        self.records.lock().await.clone()
    }
}

#[async_trait]
impl GalleryStore for MemoryStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn load_all(&self) -> Result<Vec<GalleryRecord>, StoreError> {
        Ok(self.snapshot().await)
    }

    async fn save_all(&self, records: &[GalleryRecord]) -> Result<(), StoreError> {
        *self.records.lock().await = records.to_vec();
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
