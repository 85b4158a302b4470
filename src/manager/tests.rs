#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::store::{GalleryRecord, GalleryStore, MemoryStore, StoreError};
    use crate::{Config, Rejection};
    use async_trait::async_trait;
    use std::fs;
    use std::io::Write;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn test_config(temp: &TempDir) -> Config {
        let mut config = Config::default();
        config.storage.roots = vec![temp.path().join("galleries")];
        config.storage.store_file = temp.path().join("store.json");
        config.images.normalize_delay_ms = 0;
        config
    }

    async fn boot(config: Config, store: Arc<MemoryStore>) -> GalleryManager {
        let manager = GalleryManager::new(config, store);
        manager.initialize().await.unwrap();
        manager
    }

    /// Memory store whose saves can be switched off.
    #[derive(Default)]
    struct BrokenDiskStore {
        inner: MemoryStore,
        failing: AtomicBool,
    }

    impl BrokenDiskStore {
        fn fail_saves(&self) {
            self.failing.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl GalleryStore for BrokenDiskStore {
        async fn initialize(&self) -> Result<(), StoreError> {
            self.inner.initialize().await
        }

        async fn load_all(&self) -> Result<Vec<GalleryRecord>, StoreError> {
            self.inner.load_all().await
        }

        async fn save_all(&self, records: &[GalleryRecord]) -> Result<(), StoreError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(StoreError::IoError(std::io::Error::other("disk full")));
            }
            self.inner.save_all(records).await
        }

        fn name(&self) -> &str {
            "broken-disk"
        }
    }

    fn zip_bytes(files: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        for (name, data) in files {
            writer.start_file(*name, SimpleFileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_initialize_adopts_untracked_folders() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let root = config.primary_root();
        fs::create_dir_all(root.join("birds")).unwrap();
        fs::create_dir_all(root.join(".cache")).unwrap();
        fs::write(root.join("stray.txt"), b"not a gallery").unwrap();

        let store = Arc::new(MemoryStore::new());
        let manager = boot(config, store.clone()).await;

        assert_eq!(manager.gallery_names().await, vec!["birds"]);
        let birds = manager.get_gallery("birds").await.unwrap();
        let settings = birds.settings().await;
        assert_eq!(settings.creator_id, "new");
        assert_eq!(settings.capacity, 200);
        assert_eq!(settings.tags, vec!["birds"]);
        assert!(!settings.creation_time.is_empty());

        let persisted = store.snapshot().await;
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].name, "birds");
    }

    #[tokio::test]
    async fn test_initialize_drops_records_without_directory() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let root = config.primary_root();
        fs::create_dir_all(root.join("cats")).unwrap();

        let mut cats = GalleryRecord::new(root.join("cats"));
        cats.capacity = 5;
        cats.tags = vec!["猫".to_string()];
        let store = Arc::new(MemoryStore::with_records(vec![
            cats,
            GalleryRecord::new(root.join("old")),
        ]));
        let manager = boot(config, store.clone()).await;

        assert!(manager.get_gallery("old").await.is_none());
        let cats = manager.get_gallery("cats").await.unwrap();
        assert_eq!(cats.settings().await.capacity, 5);
        assert_eq!(cats.tags().await, vec!["猫"]);

        let names: Vec<String> = store.snapshot().await.into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["cats"]);
    }

    #[tokio::test]
    async fn test_initialize_imports_pending_archives() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let root = config.primary_root();
        fs::create_dir_all(root.join("taken")).unwrap();
        fs::write(root.join("foo.zip"), zip_bytes(&[("foo/a.png", b"a")])).unwrap();
        fs::write(root.join("taken.zip"), zip_bytes(&[("b.png", b"b")])).unwrap();

        let manager = boot(config, Arc::new(MemoryStore::new())).await;

        let foo = manager.get_gallery("foo").await.unwrap();
        assert_eq!(foo.settings().await.creator_id, "zip");
        assert!(!root.join("foo.zip").exists());
        assert!(root.join("taken.zip").exists());
        assert!(!root.join("taken/b.png").exists());
        assert_eq!(manager.gallery_names().await, vec!["foo", "taken"]);
    }

    #[tokio::test]
    async fn test_create_and_delete_gallery() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let root = config.primary_root();
        let store = Arc::new(MemoryStore::new());
        let manager = boot(config, store.clone()).await;

        let created = manager.create_gallery("dogs", "42", "alice").await.unwrap();
        let dogs = created.into_value().unwrap();
        assert!(root.join("dogs").is_dir());
        assert_eq!(dogs.settings().await.creator_name, "alice");
        assert_eq!(store.snapshot().await.len(), 1);

        let again = manager.create_gallery("dogs", "43", "bob").await.unwrap();
        assert_eq!(
            again.rejection(),
            Some(&Rejection::NameTaken {
                gallery: "dogs".to_string()
            })
        );
        let invalid = manager.create_gallery("../dogs", "43", "bob").await.unwrap();
        assert!(!invalid.ok());

        let deleted = manager.delete_gallery("dogs").await.unwrap();
        assert_eq!(deleted.message(), "dogs");
        assert!(!root.join("dogs").exists());
        assert!(manager.get_gallery("dogs").await.is_none());
        assert!(store.snapshot().await.is_empty());

        let missing = manager.delete_gallery("dogs").await.unwrap();
        assert_eq!(missing.message(), "gallery 'dogs' does not exist");
    }

    #[tokio::test]
    async fn test_setters_write_through() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let manager = boot(test_config(&temp), store.clone()).await;
        manager.create_gallery("cats", "1", "alice").await.unwrap();

        let info = manager.set_capacity("cats", 3).await.unwrap().into_value().unwrap();
        assert_eq!(info.settings.capacity, 3);
        assert_eq!(store.snapshot().await[0].capacity, 3);

        let clamped = manager.set_capacity("cats", 50_000).await.unwrap();
        assert_eq!(clamped.value().unwrap().settings.capacity, crate::MAX_CAPACITY);

        let zero = manager.set_capacity("cats", 0).await.unwrap();
        assert_eq!(zero.rejection(), Some(&Rejection::InvalidCapacity { capacity: 0 }));
        assert_eq!(store.snapshot().await[0].capacity, crate::MAX_CAPACITY);

        manager.set_compress("cats", false).await.unwrap();
        manager.set_duplicate("cats", true).await.unwrap();
        let record = &store.snapshot().await[0];
        assert!(!record.compress);
        assert!(record.duplicate);

        let missing = manager.set_compress("nope", true).await.unwrap();
        assert!(!missing.ok());
    }

    #[tokio::test]
    async fn test_tag_editing_and_keyword_index() {
        let temp = TempDir::new().unwrap();
        let manager = boot(test_config(&temp), Arc::new(MemoryStore::new())).await;
        manager.create_gallery("cats", "1", "alice").await.unwrap();
        manager.create_gallery("dogs", "2", "bob").await.unwrap();

        let tags = vec![" 猫 ".to_string(), "宠物".to_string(), "猫".to_string(), "".to_string()];
        let info = manager.set_tags("cats", tags).await.unwrap().into_value().unwrap();
        assert_eq!(info.settings.tags, vec!["猫", "宠物"]);
        assert_eq!(
            manager.set_tags("cats", vec![" ".to_string()]).await.unwrap().rejection(),
            Some(&Rejection::NoTags)
        );

        assert!(manager.add_tag("cats", "kitty").await.unwrap().ok());
        assert!(!manager.add_tag("cats", "kitty").await.unwrap().ok());
        assert!(manager.remove_tag("cats", "宠物").await.unwrap().ok());
        assert!(!manager.remove_tag("cats", "宠物").await.unwrap().ok());
        assert!(matches!(
            manager.remove_tag("dogs", "dogs").await.unwrap().rejection(),
            Some(Rejection::LastTag { .. })
        ));

        manager.set_fuzzy("dogs", true).await.unwrap();
        assert_eq!(manager.exact_keywords().await, vec!["猫", "kitty"]);
        assert_eq!(manager.fuzzy_keywords().await, vec!["dogs"]);

        let tagged = manager.get_gallery_by_tag("kitty").await;
        assert_eq!(tagged.len(), 1);
        assert_eq!(tagged[0].name(), "cats");

        let fuzzy = manager.get_gallery_by_attribute(|info| info.settings.fuzzy).await;
        assert_eq!(fuzzy.len(), 1);
        assert_eq!(fuzzy[0].name(), "dogs");
    }

    #[tokio::test]
    async fn test_compress_gallery_writes_sibling_archive() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let root = config.primary_root();
        let manager = boot(config, Arc::new(MemoryStore::new())).await;
        manager.create_gallery("cats", "1", "alice").await.unwrap();
        fs::write(root.join("cats/cats_1_alice.jpg"), b"jpeg bytes").unwrap();

        let archive = manager.compress_gallery("cats").await.unwrap().unwrap();
        assert_eq!(archive, root.join("cats.zip"));
        assert!(archive.is_file());
        assert!(root.join("cats/cats_1_alice.jpg").exists());

        assert!(manager.compress_gallery("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_import_archive() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let root = config.primary_root();
        let store = Arc::new(MemoryStore::new());
        let manager = boot(config, store.clone()).await;

        let bytes = zip_bytes(&[("upload/x.png", b"x"), ("upload/y.png", b"y")]);
        let imported = manager.import_archive("shared", &bytes).await.unwrap();
        let gallery = imported.into_value().unwrap();
        assert_eq!(gallery.name(), "shared");
        gallery.wait_normalized().await;
        assert_eq!(gallery.image_count().await.unwrap(), 2);
        assert!(!root.join("shared.zip").exists());
        assert_eq!(store.snapshot().await.len(), 1);

        let taken = manager.import_archive("shared", &bytes).await.unwrap();
        assert!(matches!(taken.rejection(), Some(Rejection::NameTaken { .. })));

        let broken = manager.import_archive("broken", b"not a zip").await.unwrap();
        assert!(matches!(broken.rejection(), Some(Rejection::InvalidArchive { .. })));
        assert!(!root.join("broken.zip").exists());
        assert!(manager.get_gallery("broken").await.is_none());
    }

    #[tokio::test]
    async fn test_reload_from_json_store() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);

        let store = crate::store::create_store(&config.storage);
        let manager = GalleryManager::new(config.clone(), store);
        manager.initialize().await.unwrap();
        manager.create_gallery("cats", "1", "alice").await.unwrap();
        manager.set_fuzzy("cats", true).await.unwrap();
        drop(manager);

        let store = crate::store::create_store(&config.storage);
        let reloaded = GalleryManager::new(config, store.clone());
        reloaded.initialize().await.unwrap();

        let cats = reloaded.get_gallery("cats").await.unwrap();
        let settings = cats.settings().await;
        assert!(settings.fuzzy);
        assert_eq!(settings.creator_name, "alice");
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_save_leaves_memory_unchanged() {
        let temp = TempDir::new().unwrap();
        let config = test_config(&temp);
        let root = config.primary_root();
        let store = Arc::new(BrokenDiskStore::default());
        let manager = GalleryManager::new(config, store.clone());
        manager.initialize().await.unwrap();
        manager.create_gallery("cats", "1", "alice").await.unwrap();
        manager.set_fuzzy("cats", true).await.unwrap();

        store.fail_saves();

        assert!(manager.set_capacity("cats", 7).await.is_err());
        let cats = manager.get_gallery("cats").await.unwrap();
        assert_eq!(cats.settings().await.capacity, 200);
        assert_eq!(store.inner.snapshot().await[0].capacity, 200);

        assert!(manager.set_fuzzy("cats", false).await.is_err());
        assert_eq!(manager.fuzzy_keywords().await, vec!["cats"]);

        assert!(manager.create_gallery("dogs", "2", "bob").await.is_err());
        assert!(manager.get_gallery("dogs").await.is_none());
        assert!(!root.join("dogs").exists());
        assert_eq!(store.inner.snapshot().await.len(), 1);

        assert!(manager.delete_gallery("cats").await.is_err());
        assert!(manager.get_gallery("cats").await.is_some());
        assert!(root.join("cats").is_dir());

        let bytes = zip_bytes(&[("upload/x.png", b"x")]);
        assert!(manager.import_archive("shared", &bytes).await.is_err());
        assert!(manager.get_gallery("shared").await.is_none());
        assert!(!root.join("shared").exists());
        assert_eq!(manager.gallery_names().await, vec!["cats"]);
    }
}
