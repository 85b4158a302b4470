use crate::store::{GalleryRecord, GalleryStore, StoreError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

const EMPTY_LIST: &str = "[]";

/// Gallery records kept as a pretty-printed JSON list in a single file.
///
/// Writes overwrite the file in place. A torn write shows up as corruption
/// on the next `initialize`, which resets the list.
pub struct JsonStore {
    file: PathBuf,
    legacy_root: Option<PathBuf>,
}

impl JsonStore {
    pub fn new(file: impl Into<PathBuf>) -> Self {
        Self {
            file: file.into(),
            legacy_root: None,
        }
    }

    pub fn with_legacy_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.legacy_root = Some(root.into());
        self
    }

    pub fn file(&self) -> &Path {
        &self.file
    }

    async fn write_raw(&self, contents: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.file.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.file, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl GalleryStore for JsonStore {
    async fn initialize(&self) -> Result<(), StoreError> {
        if !tokio::fs::try_exists(&self.file).await? {
            info!("Creating gallery store at {:?}", self.file);
            return self.write_raw(EMPTY_LIST).await;
        }

        let raw = tokio::fs::read(&self.file).await?;
        match serde_json::from_slice::<serde_json::Value>(&raw) {
            Ok(serde_json::Value::Array(_)) => Ok(()),
            Ok(_) => {
                error!("Gallery store {:?} is not a list, resetting it", self.file);
                self.write_raw(EMPTY_LIST).await
            }
            Err(e) => {
                error!("Gallery store {:?} is corrupt ({}), resetting it", self.file, e);
                self.write_raw(EMPTY_LIST).await
            }
        }
    }

    async fn load_all(&self) -> Result<Vec<GalleryRecord>, StoreError> {
        if !tokio::fs::try_exists(&self.file).await? {
            return Ok(Vec::new());
        }

        let raw = tokio::fs::read(&self.file).await?;
        let entries: Vec<serde_json::Value> = match serde_json::from_slice(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Failed to parse gallery store {:?}: {}", self.file, e);
                return Ok(Vec::new());
            }
        };

        let mut records = Vec::with_capacity(entries.len());
        for (position, entry) in entries.into_iter().enumerate() {
            let record = match serde_json::from_value::<GalleryRecord>(entry) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Skipping malformed gallery record #{}: {}", position, e);
                    continue;
                }
            };
            match record.migrate(self.legacy_root.as_deref()) {
                Some(record) => records.push(record),
                None => warn!("Skipping gallery record #{} without name or path", position),
            }
        }

        debug!("Loaded {} gallery records from {:?}", records.len(), self.file);
        Ok(records)
    }

    async fn save_all(&self, records: &[GalleryRecord]) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(records)?;
        self.write_raw(&json).await?;
        debug!("Saved {} gallery records to {:?}", records.len(), self.file);
        Ok(())
    }

    fn name(&self) -> &str {
        "json"
    }
}
