use super::compress::extension_for;
use super::naming::{ImageName, filter_label, next_free_index};
use super::{Gallery, GalleryError, NormalizeReport, SharedGallery};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const FALLBACK_LABEL: &str = "local";

impl Gallery {
    pub(crate) async fn normalize_in_background(gallery: SharedGallery) -> NormalizeReport {
        let delay = Duration::from_millis(gallery.images.normalize_delay_ms);
        match gallery.normalize_names(delay).await {
            Ok(report) => {
                if !report.renamed.is_empty() || report.failed > 0 {
                    info!(
                        "Normalized gallery '{}': {} renamed, {} failed",
                        gallery.name,
                        report.renamed.len(),
                        report.failed
                    );
                }
                report
            }
            Err(e) => {
                error!("Failed to normalize gallery '{}': {}", gallery.name, e);
                NormalizeReport::default()
            }
        }
    }

    /// Rename every file that does not follow `<name>_<index>_<label>.<ext>`.
    ///
    /// Each rename holds the directory lock on its own and sleeps `delay`
    /// afterwards, so foreground operations interleave between files.
    pub async fn normalize_names(&self, delay: Duration) -> Result<NormalizeReport, GalleryError> {
        let stray: Vec<String> = {
            let _guard = self.dir_lock.lock().await;
            self.list_entries()
                .await?
                .into_iter()
                .filter(|e| e.parsed.is_none())
                .map(|e| e.file_name)
                .collect()
        };

        let mut report = NormalizeReport::default();
        for file_name in stray {
            match self.normalize_one(&file_name).await {
                Ok(Some(new_name)) => report.renamed.push((file_name, new_name)),
                Ok(None) => {}
                Err(e) => {
                    warn!(
                        "Failed to normalize {} in gallery '{}': {}",
                        file_name, self.name, e
                    );
                    report.failed += 1;
                }
            }
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        Ok(report)
    }

    async fn normalize_one(&self, file_name: &str) -> Result<Option<String>, GalleryError> {
        let _guard = self.dir_lock.lock().await;
        let source = self.path.join(file_name);
        if !tokio::fs::try_exists(&source).await? {
            debug!("{:?} vanished before it could be renamed", source);
            return Ok(None);
        }

        let data = tokio::fs::read(&source).await?;
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut label = filter_label(&stem, self.images.label_max_length);
        if label.is_empty() {
            label = FALLBACK_LABEL.to_string();
        }

        let used = self.list_entries().await?.into_iter().filter_map(|e| e.parsed.map(|p| p.index));
        let name = ImageName::new(next_free_index(used), label, extension_for(&data));
        let new_name = name.file_name(&self.name);

        tokio::fs::rename(&source, self.path.join(&new_name)).await?;
        debug!("Renamed {} -> {} in gallery '{}'", file_name, new_name, self.name);
        Ok(Some(new_name))
    }
}

#[cfg(test)]
mod tests {
    use crate::gallery::Gallery;
    use crate::store::GalleryRecord;
    use crate::ImageConfig;
    use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn encode(format: ImageFormat, seed: u8) -> Vec<u8> {
        let img = ImageBuffer::from_fn(6, 6, |x, y| Rgb([x as u8, y as u8, seed]));
        let mut out = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(img).write_to(&mut out, format).unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_stray_files_are_renamed_on_open() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("dogs");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("dogs_1_alice.png"), encode(ImageFormat::Png, 1)).unwrap();
        // Content is PNG even though the name claims JPEG.
        std::fs::write(dir.join("Rex at the beach.jpg"), encode(ImageFormat::Png, 2)).unwrap();
        std::fs::write(dir.join("zzz.gif"), encode(ImageFormat::Gif, 3)).unwrap();

        let images = ImageConfig {
            normalize_delay_ms: 0,
            ..ImageConfig::default()
        };
        let gallery = Gallery::open(GalleryRecord::new(dir.clone()), images).await.unwrap();
        let report = gallery.wait_normalized().await.unwrap();

        assert_eq!(report.failed, 0);
        assert_eq!(
            report.renamed,
            vec![
                ("Rex at the beach.jpg".to_string(), "dogs_2_Rexatthebeach.png".to_string()),
                ("zzz.gif".to_string(), "dogs_3_zzz.gif".to_string()),
            ]
        );
        assert_eq!(
            gallery.image_names().await.unwrap(),
            vec![
                "dogs_1_alice.png".to_string(),
                "dogs_2_Rexatthebeach.png".to_string(),
                "dogs_3_zzz.gif".to_string(),
            ]
        );
        assert!(gallery.wait_normalized().await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_content_defaults_to_jpg() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("misc");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("notes.txt"), b"not an image").unwrap();

        let images = ImageConfig {
            normalize_delay_ms: 0,
            ..ImageConfig::default()
        };
        let gallery = Gallery::open(GalleryRecord::new(dir), images).await.unwrap();
        gallery.wait_normalized().await;

        assert_eq!(
            gallery.image_names().await.unwrap(),
            vec!["misc_1_notes.jpg".to_string()]
        );
    }
}
