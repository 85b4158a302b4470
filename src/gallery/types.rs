use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result of a business operation on a gallery.
///
/// Rule violations such as a full gallery or an unknown index are values,
/// not errors. Each carries a human-readable message.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Done(T),
    Rejected(Rejection),
}

impl<T> Outcome<T> {
    pub fn ok(&self) -> bool {
        matches!(self, Outcome::Done(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Outcome::Done(value) => Some(value),
            Outcome::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Outcome::Done(_) => None,
            Outcome::Rejected(rejection) => Some(rejection),
        }
    }
}

impl<T: fmt::Display> Outcome<T> {
    pub fn message(&self) -> String {
        match self {
            Outcome::Done(value) => value.to_string(),
            Outcome::Rejected(rejection) => rejection.to_string(),
        }
    }
}

impl<T> From<Rejection> for Outcome<T> {
    fn from(rejection: Rejection) -> Self {
        Outcome::Rejected(rejection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("gallery '{gallery}' is full (capacity {capacity})")]
    CapacityFull { gallery: String, capacity: u32 },

    #[error("image already exists in gallery '{gallery}': {existing}")]
    Duplicate { gallery: String, existing: String },

    #[error("gallery '{gallery}' is empty")]
    Empty { gallery: String },

    #[error("gallery '{gallery}' has no image #{index}")]
    IndexMissing { gallery: String, index: u32 },

    #[error("gallery '{gallery}' has no image named {file_name}")]
    ImageMissing { gallery: String, file_name: String },

    #[error("image not found in gallery '{gallery}'")]
    NoMatch { gallery: String },

    #[error("gallery '{gallery}' does not exist")]
    GalleryMissing { gallery: String },

    #[error("gallery name '{gallery}' is already taken")]
    NameTaken { gallery: String },

    #[error("invalid gallery name '{name}'")]
    InvalidName { name: String },

    #[error("invalid capacity {capacity}, must be greater than 0")]
    InvalidCapacity { capacity: u32 },

    #[error("gallery '{gallery}' already has tag '{tag}'")]
    TagExists { gallery: String, tag: String },

    #[error("gallery '{gallery}' has no tag '{tag}'")]
    TagMissing { gallery: String, tag: String },

    #[error("cannot remove the last tag of gallery '{gallery}'")]
    LastTag { gallery: String },

    #[error("no tags given")]
    NoTags,

    #[error("archive for '{name}' could not be imported")]
    InvalidArchive { name: String },
}

/// An image file inside a gallery directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub index: u32,
    pub file_name: String,
    pub path: PathBuf,
}

impl fmt::Display for StoredImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// Mutable per-gallery metadata, everything but the identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GallerySettings {
    pub creator_id: String,
    pub creator_name: String,
    pub creation_time: String,
    pub capacity: u32,
    pub compress: bool,
    pub duplicate: bool,
    pub fuzzy: bool,
    pub tags: Vec<String>,
}

/// Point-in-time snapshot of a gallery, used for queries and display.
#[derive(Debug, Clone, PartialEq)]
pub struct GalleryInfo {
    pub name: String,
    pub path: PathBuf,
    pub settings: GallerySettings,
    pub image_count: usize,
}

impl fmt::Display for GalleryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.settings;
        writeln!(f, "name: {}", self.name)?;
        writeln!(f, "path: {}", self.path.display())?;
        writeln!(f, "creator: {} ({})", s.creator_name, s.creator_id)?;
        writeln!(f, "created: {}", s.creation_time)?;
        writeln!(f, "images: {}/{}", self.image_count, s.capacity)?;
        writeln!(f, "compress: {}", s.compress)?;
        writeln!(f, "allow duplicates: {}", s.duplicate)?;
        writeln!(f, "fuzzy match: {}", s.fuzzy)?;
        write!(f, "tags: {}", s.tags.join(", "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupReport {
    pub removed: Vec<String>,
    pub failed: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub renamed: Vec<(String, String)>,
    pub failed: usize,
}
