use super::ManagerError;
use crate::archive::extract_archives_except;
use crate::gallery::{
    Gallery, GalleryInfo, GallerySettings, Outcome, Rejection, SharedGallery, clamp_capacity,
    dir_name, now_timestamp,
};
use crate::store::{DynGalleryStore, GalleryRecord};
use crate::{Config, MAX_CAPACITY};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub(crate) type GalleryMap = BTreeMap<String, SharedGallery>;

const ARCHIVE_CREATOR: &str = "zip";

/// Tags split by how they are matched against messages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordIndex {
    pub exact: Vec<String>,
    pub fuzzy: Vec<String>,
}

/// Owns every gallery and the store that persists them.
///
/// Mutations hold the map's write lock until the store has been rewritten.
/// In-memory state changes only after the store accepted the new list.
pub struct GalleryManager {
    pub(crate) config: Config,
    pub(crate) store: DynGalleryStore,
    pub(crate) galleries: RwLock<GalleryMap>,
    pub(crate) keywords: RwLock<KeywordIndex>,
}

pub(crate) fn is_valid_gallery_name(name: &str) -> bool {
    !name.is_empty()
        && name.trim() == name
        && !name.starts_with('.')
        && !name.contains(['/', '\\', ':'])
        && !name.chars().any(char::is_control)
}

impl GalleryManager {
    pub fn new(config: Config, store: DynGalleryStore) -> Self {
        Self {
            config,
            store,
            galleries: RwLock::new(BTreeMap::new()),
            keywords: RwLock::new(KeywordIndex::default()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Load persisted galleries, adopt untracked folders and pending
    /// archives under every root, then write the merged list back.
    pub async fn initialize(&self) -> Result<(), ManagerError> {
        info!(
            "Initializing gallery manager ({} roots, '{}' store)",
            self.config.storage.roots.len(),
            self.store.name()
        );

        for root in &self.config.storage.roots {
            tokio::fs::create_dir_all(root).await?;
        }
        self.store.initialize().await?;

        let mut galleries = self.galleries.write().await;
        galleries.clear();

        for record in self.store.load_valid().await? {
            self.register(&mut galleries, record).await;
        }
        debug!("Loaded {} galleries from the store", galleries.len());

        for root in &self.config.storage.roots {
            self.adopt_folders(&mut galleries, root).await?;
        }
        for root in &self.config.storage.roots {
            self.reconcile_archives(&mut galleries, root).await?;
        }

        self.commit(&galleries).await?;
        info!("Gallery manager ready with {} galleries", galleries.len());
        Ok(())
    }

    async fn register(&self, galleries: &mut GalleryMap, record: GalleryRecord) -> Option<SharedGallery> {
        let name = dir_name(&record.path)?;
        if galleries.contains_key(&name) {
            warn!("Gallery '{}' is already registered, ignoring {:?}", name, record.path);
            return None;
        }

        let path = record.path.clone();
        match Gallery::open(record, self.config.images.clone()).await {
            Ok(gallery) => {
                galleries.insert(name, gallery.clone());
                Some(gallery)
            }
            Err(e) => {
                warn!("Failed to open gallery at {:?}: {}", path, e);
                None
            }
        }
    }

    async fn adopt_folders(&self, galleries: &mut GalleryMap, root: &Path) -> Result<(), ManagerError> {
        let mut found = Vec::new();
        let mut dir = tokio::fs::read_dir(root).await?;
        while let Some(entry) = dir.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') || galleries.contains_key(&name) {
                continue;
            }
            found.push(entry.path());
        }
        found.sort();

        for path in found {
            let record = GalleryRecord::from_defaults(path, &self.config.defaults);
            if let Some(gallery) = self.register(galleries, record).await {
                info!("Registered folder {:?} as gallery '{}'", gallery.path(), gallery.name());
            }
        }
        Ok(())
    }

    /// Extract pending archives under `root` and register the results.
    pub(crate) async fn reconcile_archives(
        &self,
        galleries: &mut GalleryMap,
        root: &Path,
    ) -> Result<Vec<SharedGallery>, ManagerError> {
        let taken: HashSet<String> = galleries.keys().cloned().collect();
        let root = root.to_path_buf();
        let folders =
            tokio::task::spawn_blocking(move || extract_archives_except(&root, |name| taken.contains(name)))
                .await?;

        let mut added = Vec::new();
        for folder in folders {
            let record = GalleryRecord {
                creator_id: ARCHIVE_CREATOR.to_string(),
                creator_name: ARCHIVE_CREATOR.to_string(),
                ..GalleryRecord::from_defaults(folder, &self.config.defaults)
            };
            if let Some(gallery) = self.register(galleries, record).await {
                info!("Imported archive as gallery '{}'", gallery.name());
                added.push(gallery);
            }
        }
        Ok(added)
    }

    async fn rebuild_keywords(&self, galleries: &GalleryMap) {
        let mut index = KeywordIndex::default();
        for gallery in galleries.values() {
            let settings = gallery.settings().await;
            if settings.fuzzy {
                index.fuzzy.extend(settings.tags);
            } else {
                index.exact.extend(settings.tags);
            }
        }
        *self.keywords.write().await = index;
    }

    async fn records(&self, galleries: &GalleryMap) -> Vec<GalleryRecord> {
        let mut records = Vec::with_capacity(galleries.len());
        for gallery in galleries.values() {
            records.push(gallery.to_record().await);
        }
        records
    }

    /// Write the full list through to the store, then refresh derived state.
    pub(crate) async fn commit(&self, galleries: &GalleryMap) -> Result<(), ManagerError> {
        let records = self.records(galleries).await;
        self.store.save_all(&records).await?;
        self.rebuild_keywords(galleries).await;
        Ok(())
    }

    /// Undo a gallery that was opened but never made it into the store.
    pub(crate) async fn discard(&self, gallery: &Gallery, remove_dir: bool) {
        if !remove_dir {
            gallery.stop_normalizer().await;
            return;
        }
        if let Err(e) = gallery.delete().await {
            warn!("Failed to clean up gallery '{}': {}", gallery.name(), e);
        }
    }

    pub async fn create_gallery(
        &self,
        name: &str,
        creator_id: &str,
        creator_name: &str,
    ) -> Result<Outcome<SharedGallery>, ManagerError> {
        if !is_valid_gallery_name(name) {
            return Ok(Rejection::InvalidName {
                name: name.to_string(),
            }
            .into());
        }

        let mut galleries = self.galleries.write().await;
        if galleries.contains_key(name) {
            return Ok(Rejection::NameTaken {
                gallery: name.to_string(),
            }
            .into());
        }

        let path = self.config.primary_root().join(name);
        let record = GalleryRecord {
            creator_id: creator_id.to_string(),
            creator_name: creator_name.to_string(),
            creation_time: now_timestamp(),
            ..GalleryRecord::from_defaults(path, &self.config.defaults)
        };
        let existed = tokio::fs::try_exists(&record.path).await?;
        let gallery = Gallery::open(record, self.config.images.clone()).await?;

        let mut records = self.records(&galleries).await;
        records.push(gallery.to_record().await);
        records.sort_by(|a, b| a.name.cmp(&b.name));
        if let Err(e) = self.store.save_all(&records).await {
            self.discard(&gallery, !existed).await;
            return Err(e.into());
        }
        galleries.insert(name.to_string(), gallery.clone());
        self.rebuild_keywords(&galleries).await;

        info!("Created gallery '{}' for {} ({})", name, creator_name, creator_id);
        Ok(Outcome::Done(gallery))
    }

    pub async fn delete_gallery(&self, name: &str) -> Result<Outcome<String>, ManagerError> {
        let mut galleries = self.galleries.write().await;
        let Some(gallery) = galleries.get(name).cloned() else {
            return Ok(Rejection::GalleryMissing {
                gallery: name.to_string(),
            }
            .into());
        };

        let records: Vec<GalleryRecord> = self
            .records(&galleries)
            .await
            .into_iter()
            .filter(|record| record.name != name)
            .collect();
        self.store.save_all(&records).await?;
        galleries.remove(name);
        self.rebuild_keywords(&galleries).await;

        gallery.delete().await?;

        info!("Deleted gallery '{}'", name);
        Ok(Outcome::Done(name.to_string()))
    }

    async fn update(
        &self,
        name: &str,
        f: impl FnOnce(&str, &mut GallerySettings) -> Result<(), Rejection>,
    ) -> Result<Outcome<GalleryInfo>, ManagerError> {
        let galleries = self.galleries.write().await;
        let Some(gallery) = galleries.get(name) else {
            return Ok(Rejection::GalleryMissing {
                gallery: name.to_string(),
            }
            .into());
        };

        let mut settings = gallery.settings().await;
        if let Err(rejection) = f(name, &mut settings) {
            return Ok(rejection.into());
        }

        let mut records = Vec::with_capacity(galleries.len());
        for (key, other) in galleries.iter() {
            if key == name {
                records.push(other.record_with(&settings));
            } else {
                records.push(other.to_record().await);
            }
        }
        self.store.save_all(&records).await?;

        gallery.update_settings(|current| *current = settings).await;
        self.rebuild_keywords(&galleries).await;
        Ok(Outcome::Done(gallery.info().await))
    }

    /// Values above the hard maximum are clamped, zero is rejected.
    pub async fn set_capacity(&self, name: &str, capacity: u32) -> Result<Outcome<GalleryInfo>, ManagerError> {
        self.update(name, |_, settings| {
            if capacity == 0 {
                return Err(Rejection::InvalidCapacity { capacity });
            }
            if capacity > MAX_CAPACITY {
                warn!("Capacity {} for '{}' clamped to {}", capacity, name, MAX_CAPACITY);
            }
            settings.capacity = clamp_capacity(capacity);
            Ok(())
        })
        .await
    }

    pub async fn set_compress(&self, name: &str, compress: bool) -> Result<Outcome<GalleryInfo>, ManagerError> {
        self.update(name, |_, settings| {
            settings.compress = compress;
            Ok(())
        })
        .await
    }

    pub async fn set_duplicate(&self, name: &str, duplicate: bool) -> Result<Outcome<GalleryInfo>, ManagerError> {
        self.update(name, |_, settings| {
            settings.duplicate = duplicate;
            Ok(())
        })
        .await
    }

    pub async fn set_fuzzy(&self, name: &str, fuzzy: bool) -> Result<Outcome<GalleryInfo>, ManagerError> {
        self.update(name, |_, settings| {
            settings.fuzzy = fuzzy;
            Ok(())
        })
        .await
    }

    /// Replace all tags. Blank entries and repeats are dropped.
    pub async fn set_tags(&self, name: &str, tags: Vec<String>) -> Result<Outcome<GalleryInfo>, ManagerError> {
        let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
        for tag in tags {
            let tag = tag.trim();
            if !tag.is_empty() && !cleaned.iter().any(|t| t == tag) {
                cleaned.push(tag.to_string());
            }
        }

        self.update(name, |_, settings| {
            if cleaned.is_empty() {
                return Err(Rejection::NoTags);
            }
            settings.tags = cleaned;
            Ok(())
        })
        .await
    }

    pub async fn add_tag(&self, name: &str, tag: &str) -> Result<Outcome<GalleryInfo>, ManagerError> {
        let tag = tag.trim();
        self.update(name, |gallery, settings| {
            if tag.is_empty() {
                return Err(Rejection::NoTags);
            }
            if settings.tags.iter().any(|t| t == tag) {
                return Err(Rejection::TagExists {
                    gallery: gallery.to_string(),
                    tag: tag.to_string(),
                });
            }
            settings.tags.push(tag.to_string());
            Ok(())
        })
        .await
    }

    pub async fn remove_tag(&self, name: &str, tag: &str) -> Result<Outcome<GalleryInfo>, ManagerError> {
        let tag = tag.trim();
        self.update(name, |gallery, settings| {
            let Some(position) = settings.tags.iter().position(|t| t == tag) else {
                return Err(Rejection::TagMissing {
                    gallery: gallery.to_string(),
                    tag: tag.to_string(),
                });
            };
            if settings.tags.len() == 1 {
                return Err(Rejection::LastTag {
                    gallery: gallery.to_string(),
                });
            }
            settings.tags.remove(position);
            Ok(())
        })
        .await
    }

    pub(crate) fn primary_root(&self) -> PathBuf {
        self.config.primary_root()
    }
}

#[cfg(test)]
mod name_tests {
    use super::is_valid_gallery_name;

    #[test]
    fn test_gallery_names() {
        assert!(is_valid_gallery_name("cats"));
        assert!(is_valid_gallery_name("my_cats"));
        assert!(is_valid_gallery_name("猫猫"));
        assert!(is_valid_gallery_name("123456789"));
        assert!(!is_valid_gallery_name(""));
        assert!(!is_valid_gallery_name(" cats"));
        assert!(!is_valid_gallery_name(".hidden"));
        assert!(!is_valid_gallery_name("../etc"));
        assert!(!is_valid_gallery_name("a/b"));
        assert!(!is_valid_gallery_name("a\\b"));
    }
}
