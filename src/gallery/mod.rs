// Gallery module - one directory of images plus its metadata
pub mod compress;
mod core;
mod error;
pub mod naming;
mod normalize;
mod types;

pub use error::GalleryError;
pub use types::*;

use crate::store::GalleryRecord;
use crate::{ImageConfig, MAX_CAPACITY};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub type SharedGallery = Arc<Gallery>;

pub struct Gallery {
    pub(crate) name: String,
    pub(crate) path: PathBuf,
    pub(crate) settings: RwLock<GallerySettings>,
    pub(crate) images: ImageConfig,
    /// Serializes every file operation on the directory, including each
    /// individual rename performed by the background normalizer.
    pub(crate) dir_lock: Mutex<()>,
    pub(crate) normalizer: Mutex<Option<JoinHandle<NormalizeReport>>>,
}

pub fn clamp_capacity(capacity: u32) -> u32 {
    capacity.clamp(1, MAX_CAPACITY)
}

pub(crate) fn now_timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

impl Gallery {
    /// Build a gallery from its stored record, creating the directory if
    /// needed and starting the background name normalization.
    pub async fn open(record: GalleryRecord, images: ImageConfig) -> Result<SharedGallery, GalleryError> {
        let gallery = Arc::new(Self::from_record(record, images)?);
        tokio::fs::create_dir_all(&gallery.path).await?;

        debug!("Opened gallery '{}' at {:?}", gallery.name, gallery.path);

        let handle = tokio::spawn(Gallery::normalize_in_background(gallery.clone()));
        *gallery.normalizer.lock().await = Some(handle);

        Ok(gallery)
    }

    fn from_record(record: GalleryRecord, images: ImageConfig) -> Result<Self, GalleryError> {
        let name = dir_name(&record.path)
            .ok_or_else(|| GalleryError::InvalidPath(record.path.display().to_string()))?;

        let tags = if record.tags.is_empty() {
            vec![name.clone()]
        } else {
            record.tags
        };
        let creation_time = if record.creation_time.is_empty() {
            now_timestamp()
        } else {
            record.creation_time
        };

        Ok(Self {
            name,
            path: record.path,
            settings: RwLock::new(GallerySettings {
                creator_id: record.creator_id,
                creator_name: record.creator_name,
                creation_time,
                capacity: clamp_capacity(record.capacity),
                compress: record.compress,
                duplicate: record.duplicate,
                fuzzy: record.fuzzy,
                tags,
            }),
            images,
            dir_lock: Mutex::new(()),
            normalizer: Mutex::new(None),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn settings(&self) -> GallerySettings {
        self.settings.read().await.clone()
    }

    pub async fn tags(&self) -> Vec<String> {
        self.settings.read().await.tags.clone()
    }

    pub async fn info(&self) -> GalleryInfo {
        let image_count = match self.image_count().await {
            Ok(count) => count,
            Err(e) => {
                warn!("Failed to count images in gallery '{}': {}", self.name, e);
                0
            }
        };
        GalleryInfo {
            name: self.name.clone(),
            path: self.path.clone(),
            settings: self.settings().await,
            image_count,
        }
    }

    pub async fn to_record(&self) -> GalleryRecord {
        let settings = self.settings.read().await;
        self.record_with(&settings)
    }

    /// The record this gallery would persist with `s` as its settings.
    pub(crate) fn record_with(&self, s: &GallerySettings) -> GalleryRecord {
        GalleryRecord {
            version: crate::store::RECORD_VERSION,
            name: self.name.clone(),
            path: self.path.clone(),
            creator_id: s.creator_id.clone(),
            creator_name: s.creator_name.clone(),
            creation_time: s.creation_time.clone(),
            capacity: s.capacity,
            compress: s.compress,
            duplicate: s.duplicate,
            fuzzy: s.fuzzy,
            tags: s.tags.clone(),
        }
    }

    pub(crate) async fn update_settings<R>(&self, f: impl FnOnce(&mut GallerySettings) -> R) -> R {
        let mut settings = self.settings.write().await;
        f(&mut settings)
    }

    pub(crate) async fn stop_normalizer(&self) {
        if let Some(normalizer) = self.normalizer.lock().await.take() {
            normalizer.abort();
        }
    }

    /// Wait for the startup normalization pass to finish. Returns `None` if
    /// it was already awaited.
    pub async fn wait_normalized(&self) -> Option<NormalizeReport> {
        let handle = self.normalizer.lock().await.take()?;
        handle.await.ok()
    }
}

pub(crate) fn dir_name(path: &Path) -> Option<String> {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .filter(|name| !name.is_empty())
}
