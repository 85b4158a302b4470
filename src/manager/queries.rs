use super::{GalleryManager, KeywordIndex};
use crate::gallery::{GalleryInfo, Outcome, Rejection, SharedGallery};

impl GalleryManager {
    pub async fn get_gallery(&self, name: &str) -> Option<SharedGallery> {
        self.galleries.read().await.get(name).cloned()
    }

    /// Like [`get_gallery`](Self::get_gallery), with a rejection carrying the
    /// user-facing message when the gallery is unknown.
    pub async fn find_gallery(&self, name: &str) -> Outcome<SharedGallery> {
        match self.get_gallery(name).await {
            Some(gallery) => Outcome::Done(gallery),
            None => Rejection::GalleryMissing {
                gallery: name.to_string(),
            }
            .into(),
        }
    }

    /// All galleries ordered by name.
    pub async fn get_all_galleries(&self) -> Vec<SharedGallery> {
        self.galleries.read().await.values().cloned().collect()
    }

    pub async fn gallery_names(&self) -> Vec<String> {
        self.galleries.read().await.keys().cloned().collect()
    }

    pub async fn get_gallery_by_attribute(
        &self,
        predicate: impl Fn(&GalleryInfo) -> bool,
    ) -> Vec<SharedGallery> {
        let mut matched = Vec::new();
        for gallery in self.get_all_galleries().await {
            if predicate(&gallery.info().await) {
                matched.push(gallery);
            }
        }
        matched
    }

    pub async fn get_gallery_by_tag(&self, tag: &str) -> Vec<SharedGallery> {
        let mut matched = Vec::new();
        for gallery in self.get_all_galleries().await {
            if gallery.tags().await.iter().any(|t| t == tag) {
                matched.push(gallery);
            }
        }
        matched
    }

    pub async fn keyword_index(&self) -> KeywordIndex {
        self.keywords.read().await.clone()
    }

    /// Tags of galleries matched by whole-message equality.
    pub async fn exact_keywords(&self) -> Vec<String> {
        self.keywords.read().await.exact.clone()
    }

    /// Tags of galleries matched by substring.
    pub async fn fuzzy_keywords(&self) -> Vec<String> {
        self.keywords.read().await.fuzzy.clone()
    }
}
