use super::core::is_valid_gallery_name;
use super::{GalleryManager, ManagerError};
use crate::archive::zip_dir;
use crate::gallery::{Outcome, Rejection, SharedGallery};
use std::path::PathBuf;
use tracing::{info, warn};

impl GalleryManager {
    /// Zip a gallery into `<root>/<name>.zip` next to its directory. The
    /// directory itself is left in place.
    pub async fn compress_gallery(&self, name: &str) -> Result<Option<PathBuf>, ManagerError> {
        let Some(gallery) = self.get_gallery(name).await else {
            warn!("Cannot archive unknown gallery '{}'", name);
            return Ok(None);
        };
        let dir = gallery.path().to_path_buf();
        let Some(root) = dir.parent() else {
            return Ok(None);
        };
        let archive = root.join(format!("{}.zip", gallery.name()));

        info!("Archiving gallery '{}' to {:?}", name, archive);
        let _guard = gallery.dir_lock.lock().await;
        let target = archive.clone();
        let written = tokio::task::spawn_blocking(move || zip_dir(&dir, &target)).await?;

        Ok(written.then_some(archive))
    }

    /// Store an uploaded archive as `<primary root>/<name>.zip` and import it
    /// the same way pending archives are imported at startup.
    pub async fn import_archive(&self, name: &str, bytes: &[u8]) -> Result<Outcome<SharedGallery>, ManagerError> {
        if !is_valid_gallery_name(name) {
            return Ok(Rejection::InvalidName {
                name: name.to_string(),
            }
            .into());
        }

        let mut galleries = self.galleries.write().await;
        let root = self.primary_root();
        let archive = root.join(format!("{}.zip", name));
        if galleries.contains_key(name)
            || tokio::fs::try_exists(root.join(name)).await?
            || tokio::fs::try_exists(&archive).await?
        {
            return Ok(Rejection::NameTaken {
                gallery: name.to_string(),
            }
            .into());
        }

        tokio::fs::create_dir_all(&root).await?;
        tokio::fs::write(&archive, bytes).await?;

        let added = self.reconcile_archives(&mut galleries, &root).await?;
        if !added.is_empty()
            && let Err(e) = self.commit(&galleries).await
        {
            for gallery in &added {
                galleries.remove(gallery.name());
                self.discard(gallery, gallery.name() == name).await;
            }
            return Err(e);
        }

        if let Some(gallery) = added.into_iter().find(|g| g.name() == name) {
            return Ok(Outcome::Done(gallery));
        }

        if tokio::fs::try_exists(&archive).await.unwrap_or(false)
            && let Err(e) = tokio::fs::remove_file(&archive).await
        {
            warn!("Failed to remove rejected archive {:?}: {}", archive, e);
        }
        Ok(Rejection::InvalidArchive {
            name: name.to_string(),
        }
        .into())
    }
}
