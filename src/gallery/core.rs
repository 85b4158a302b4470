use super::compress::{compress_image, extension_for, needs_compression};
use super::naming::{ImageName, filter_label, listing_order, next_free_index};
use super::{DedupReport, Gallery, GalleryError, Outcome, Rejection, StoredImage};
use rand::seq::IndexedRandom;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const DEFAULT_LABEL: &str = "anon";

/// A regular file found in the gallery directory.
#[derive(Debug, Clone)]
pub(crate) struct DirEntry {
    pub file_name: String,
    pub path: PathBuf,
    pub parsed: Option<ImageName>,
}

impl DirEntry {
    fn index(&self) -> Option<u32> {
        self.parsed.as_ref().map(|p| p.index)
    }

    fn to_stored(&self) -> StoredImage {
        StoredImage {
            index: self.index().unwrap_or(0),
            file_name: self.file_name.clone(),
            path: self.path.clone(),
        }
    }
}

impl Gallery {
    /// All regular, non-hidden files in the directory, index ascending
    /// followed by non-conforming names in lexicographic order.
    pub(crate) async fn list_entries(&self) -> Result<Vec<DirEntry>, GalleryError> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(&self.path).await?;

        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().to_string();
            if file_name.starts_with('.') || !entry.file_type().await?.is_file() {
                continue;
            }
            let parsed = ImageName::parse(&self.name, &file_name);
            entries.push(DirEntry {
                file_name,
                path: entry.path(),
                parsed,
            });
        }

        entries.sort_by(|a, b| {
            listing_order((&a.parsed, &a.file_name), (&b.parsed, &b.file_name))
        });
        Ok(entries)
    }

    pub async fn image_count(&self) -> Result<usize, GalleryError> {
        Ok(self.list_entries().await?.len())
    }

    pub async fn image_names(&self) -> Result<Vec<String>, GalleryError> {
        let _guard = self.dir_lock.lock().await;
        Ok(self
            .list_entries()
            .await?
            .into_iter()
            .map(|e| e.file_name)
            .collect())
    }

    pub fn needs_compression(&self, bytes: &[u8]) -> bool {
        needs_compression(bytes, self.images.compress_max_size)
    }

    /// Store `bytes` under a generated name. `index == 0` picks the smallest
    /// free index; any other value replaces whatever occupies that slot.
    pub async fn add_image(
        &self,
        bytes: &[u8],
        label: &str,
        index: u32,
    ) -> Result<Outcome<StoredImage>, GalleryError> {
        let settings = self.settings().await;
        let _guard = self.dir_lock.lock().await;
        let entries = self.list_entries().await?;

        let replaced: Vec<&DirEntry> = if index > 0 {
            entries.iter().filter(|e| e.index() == Some(index)).collect()
        } else {
            Vec::new()
        };
        let effective_count = entries.len() - replaced.len();
        if effective_count >= settings.capacity as usize {
            debug!("Gallery '{}' is at capacity {}", self.name, settings.capacity);
            return Ok(Rejection::CapacityFull {
                gallery: self.name.clone(),
                capacity: settings.capacity,
            }
            .into());
        }

        let data = if settings.compress {
            let owned = bytes.to_vec();
            let max_size = self.images.compress_max_size;
            match tokio::task::spawn_blocking(move || compress_image(&owned, max_size)).await? {
                Ok(Some(compressed)) => compressed,
                Ok(None) => bytes.to_vec(),
                Err(e) => {
                    warn!("Failed to compress image for '{}', storing original: {}", self.name, e);
                    bytes.to_vec()
                }
            }
        } else {
            bytes.to_vec()
        };

        if !settings.duplicate
            && let Some(existing) = self.find_by_content(&entries, &data).await?
        {
            return Ok(Rejection::Duplicate {
                gallery: self.name.clone(),
                existing: existing.file_name.clone(),
            }
            .into());
        }

        let index = if index > 0 {
            index
        } else {
            next_free_index(entries.iter().filter_map(|e| e.index()))
        };
        let mut label = filter_label(label, self.images.label_max_length);
        if label.is_empty() {
            label = DEFAULT_LABEL.to_string();
        }
        let name = ImageName::new(index, label, extension_for(&data));
        let file_name = name.file_name(&self.name);
        let path = self.path.join(&file_name);

        tokio::fs::write(&path, &data).await?;
        info!("Added {} to gallery '{}'", file_name, self.name);

        for old in replaced.iter().filter(|old| old.path != path) {
            tokio::fs::remove_file(&old.path).await?;
            debug!("Replaced {} in gallery '{}'", old.file_name, self.name);
        }

        Ok(Outcome::Done(StoredImage {
            index,
            file_name,
            path,
        }))
    }

    pub async fn delete_image_by_index(
        &self,
        index: u32,
    ) -> Result<Outcome<StoredImage>, GalleryError> {
        let _guard = self.dir_lock.lock().await;
        let entries = self.list_entries().await?;
        if entries.is_empty() {
            return Ok(Rejection::Empty {
                gallery: self.name.clone(),
            }
            .into());
        }

        let Some(entry) = entries.iter().find(|e| e.index() == Some(index)) else {
            return Ok(Rejection::IndexMissing {
                gallery: self.name.clone(),
                index,
            }
            .into());
        };

        tokio::fs::remove_file(&entry.path).await?;
        info!("Deleted {} from gallery '{}'", entry.file_name, self.name);
        Ok(Outcome::Done(entry.to_stored()))
    }

    pub async fn delete_image(&self, file_name: &str) -> Result<Outcome<StoredImage>, GalleryError> {
        let _guard = self.dir_lock.lock().await;
        let entries = self.list_entries().await?;
        let Some(entry) = entries.iter().find(|e| e.file_name == file_name) else {
            return Ok(Rejection::ImageMissing {
                gallery: self.name.clone(),
                file_name: file_name.to_string(),
            }
            .into());
        };

        tokio::fs::remove_file(&entry.path).await?;
        info!("Deleted {} from gallery '{}'", entry.file_name, self.name);
        Ok(Outcome::Done(entry.to_stored()))
    }

    pub async fn view_by_index(&self, index: u32) -> Result<Outcome<StoredImage>, GalleryError> {
        let _guard = self.dir_lock.lock().await;
        let entries = self.list_entries().await?;
        if entries.is_empty() {
            return Ok(Rejection::Empty {
                gallery: self.name.clone(),
            }
            .into());
        }

        Ok(match entries.iter().find(|e| e.index() == Some(index)) {
            Some(entry) => Outcome::Done(entry.to_stored()),
            None => Rejection::IndexMissing {
                gallery: self.name.clone(),
                index,
            }
            .into(),
        })
    }

    /// First file (in listing order) whose content equals `bytes`.
    pub async fn view_by_bytes(&self, bytes: &[u8]) -> Result<Outcome<StoredImage>, GalleryError> {
        let _guard = self.dir_lock.lock().await;
        let entries = self.list_entries().await?;

        Ok(match self.find_by_content(&entries, bytes).await? {
            Some(entry) => Outcome::Done(entry.to_stored()),
            None => Rejection::NoMatch {
                gallery: self.name.clone(),
            }
            .into(),
        })
    }

    pub async fn random_image(&self) -> Result<Outcome<StoredImage>, GalleryError> {
        let _guard = self.dir_lock.lock().await;
        let entries = self.list_entries().await?;

        let picked = entries.choose(&mut rand::rng()).map(DirEntry::to_stored);
        Ok(match picked {
            Some(image) => Outcome::Done(image),
            None => Rejection::Empty {
                gallery: self.name.clone(),
            }
            .into(),
        })
    }

    /// Delete every file whose bytes equal an earlier file's (listing order).
    /// Candidates are grouped by SHA-256 and confirmed byte-for-byte.
    /// Failures on single files are logged and skipped.
    pub async fn remove_duplicates(&self) -> Result<DedupReport, GalleryError> {
        let _guard = self.dir_lock.lock().await;
        let entries = self.list_entries().await?;
        let mut kept: HashMap<[u8; 32], Vec<PathBuf>> = HashMap::new();
        let mut report = DedupReport::default();

        for entry in entries {
            let data = match tokio::fs::read(&entry.path).await {
                Ok(data) => data,
                Err(e) => {
                    warn!("Failed to read {:?} during dedup: {}", entry.path, e);
                    report.failed += 1;
                    continue;
                }
            };
            let digest: [u8; 32] = Sha256::digest(&data).into();

            let mut is_duplicate = false;
            if let Some(candidates) = kept.get(&digest) {
                for candidate in candidates {
                    if tokio::fs::read(candidate).await.is_ok_and(|other| other == data) {
                        is_duplicate = true;
                        break;
                    }
                }
            }

            if !is_duplicate {
                kept.entry(digest).or_default().push(entry.path);
                continue;
            }

            match tokio::fs::remove_file(&entry.path).await {
                Ok(()) => {
                    info!("Removed duplicate {} from gallery '{}'", entry.file_name, self.name);
                    report.removed.push(entry.file_name);
                }
                Err(e) => {
                    warn!("Failed to remove duplicate {:?}: {}", entry.path, e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    /// Remove the whole gallery directory. The manager drops its own entry.
    pub async fn delete(&self) -> Result<bool, GalleryError> {
        self.stop_normalizer().await;
        let _guard = self.dir_lock.lock().await;
        if !tokio::fs::try_exists(&self.path).await? {
            warn!("Gallery directory already gone: {:?}", self.path);
            return Ok(false);
        }
        tokio::fs::remove_dir_all(&self.path).await?;
        info!("Deleted gallery directory {:?}", self.path);
        Ok(true)
    }

    async fn find_by_content<'a>(
        &self,
        entries: &'a [DirEntry],
        bytes: &[u8],
    ) -> Result<Option<&'a DirEntry>, GalleryError> {
        for entry in entries {
            let len = tokio::fs::metadata(&entry.path).await?.len();
            if len != bytes.len() as u64 {
                continue;
            }
            if tokio::fs::read(&entry.path).await? == bytes {
                return Ok(Some(entry));
            }
        }
        Ok(None)
    }
}
