use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod archive;
pub mod gallery;
pub mod manager;
pub mod matcher;
pub mod permission;
pub mod relevance;
pub mod startup_checks;
pub mod store;

pub use gallery::{Gallery, GalleryError, Outcome, Rejection, SharedGallery, StoredImage};
pub use manager::{GalleryManager, ManagerError};
pub use matcher::{AutoMatcher, MatchHit, MatchMode};
pub use permission::{Operation, PermissionConfig};
pub use relevance::RelevanceBM25;
pub use store::{DynGalleryStore, GalleryRecord, GalleryStore, JsonStore, MemoryStore, StoreError};

/// Hard upper bound for a gallery's capacity.
pub const MAX_CAPACITY: u32 = 9999;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub defaults: GalleryDefaults,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub matching: MatchingConfig,
    #[serde(default)]
    pub permissions: PermissionConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directories scanned for gallery folders and pending `.zip` imports.
    /// New galleries are created under the first one.
    pub roots: Vec<PathBuf>,
    pub store_file: PathBuf,
}

/// Template applied whenever the manager registers a folder it has no record for.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GalleryDefaults {
    pub creator_id: String,
    pub creator_name: String,
    pub capacity: u32,
    pub compress: bool,
    /// `true` allows byte-identical images to be stored more than once.
    pub duplicate: bool,
    pub fuzzy: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ImageConfig {
    pub compress_max_size: u32,
    pub label_max_length: usize,
    pub normalize_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub user_min_msg_len: usize,
    pub user_max_msg_len: usize,
    pub exact_prob: f64,
    pub fuzzy_prob: f64,
    pub bm25_threshold: f64,
    pub bm25_prob: f64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            roots: vec![PathBuf::from("galleries")],
            store_file: PathBuf::from("gallery_info.json"),
        }
    }
}

impl Default for GalleryDefaults {
    fn default() -> Self {
        Self {
            creator_id: "new".to_string(),
            creator_name: "new".to_string(),
            capacity: 200,
            compress: true,
            duplicate: false,
            fuzzy: false,
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            compress_max_size: 512,
            label_max_length: 128,
            normalize_delay_ms: 100,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            user_min_msg_len: 1,
            user_max_msg_len: 20,
            exact_prob: 0.9,
            fuzzy_prob: 0.9,
            bm25_threshold: 0.3,
            bm25_prob: 0.5,
        }
    }
}

impl Config {
    pub fn primary_root(&self) -> PathBuf {
        self.storage
            .roots
            .first()
            .cloned()
            .unwrap_or_else(|| PathBuf::from("galleries"))
    }
}
