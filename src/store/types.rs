use crate::GalleryDefaults;
use crate::gallery::dir_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Schema version written with every record. Records without one predate
/// versioning and may use the old field names accepted via aliases below.
pub const RECORD_VERSION: u32 = 1;

const UNKNOWN_CREATOR: &str = "unknown";
const DEFAULT_CAPACITY: u32 = 200;

fn default_creator() -> String {
    UNKNOWN_CREATOR.to_string()
}

fn default_capacity() -> u32 {
    DEFAULT_CAPACITY
}

/// Persisted metadata of one gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GalleryRecord {
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub path: PathBuf,
    #[serde(default = "default_creator")]
    pub creator_id: String,
    #[serde(default = "default_creator")]
    pub creator_name: String,
    #[serde(default)]
    pub creation_time: String,
    #[serde(default = "default_capacity", alias = "max_capacity")]
    pub capacity: u32,
    #[serde(default, alias = "compress_switch")]
    pub compress: bool,
    /// `true` allows byte-identical images.
    #[serde(default, alias = "duplicate_switch")]
    pub duplicate: bool,
    #[serde(default, alias = "fuzzy_match")]
    pub fuzzy: bool,
    #[serde(default, alias = "keywords")]
    pub tags: Vec<String>,
}

impl GalleryRecord {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            version: RECORD_VERSION,
            name: dir_name(&path).unwrap_or_default(),
            path,
            creator_id: default_creator(),
            creator_name: default_creator(),
            creation_time: String::new(),
            capacity: DEFAULT_CAPACITY,
            compress: false,
            duplicate: false,
            fuzzy: false,
            tags: Vec::new(),
        }
    }

    /// Record for a folder found on disk without metadata.
    pub fn from_defaults(path: impl Into<PathBuf>, defaults: &GalleryDefaults) -> Self {
        Self {
            creator_id: defaults.creator_id.clone(),
            creator_name: defaults.creator_name.clone(),
            capacity: defaults.capacity,
            compress: defaults.compress,
            duplicate: defaults.duplicate,
            fuzzy: defaults.fuzzy,
            ..Self::new(path)
        }
    }

    /// Bring a freshly read record up to the current schema. Returns `None`
    /// when the record identifies no directory at all.
    pub fn migrate(mut self, legacy_root: Option<&Path>) -> Option<Self> {
        if self.path.as_os_str().is_empty() {
            if self.name.is_empty() {
                return None;
            }
            self.path = legacy_root?.join(&self.name);
        }
        if let Some(name) = dir_name(&self.path) {
            self.name = name;
        }
        self.version = RECORD_VERSION;
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_field_names() {
        let json = r#"{
            "name": "cats",
            "path": "/data/cats",
            "creator_id": "42",
            "creator_name": "alice",
            "creation_time": "2024-01-01 10:00:00",
            "password": "114514",
            "max_capacity": 30,
            "compress_switch": true,
            "duplicate_switch": true,
            "fuzzy_match": true,
            "keywords": ["cats", "kitty"]
        }"#;
        let record: GalleryRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.version, 0);
        assert_eq!(record.capacity, 30);
        assert!(record.compress);
        assert!(record.duplicate);
        assert!(record.fuzzy);
        assert_eq!(record.tags, vec!["cats", "kitty"]);

        let migrated = record.migrate(None).unwrap();
        assert_eq!(migrated.version, RECORD_VERSION);

        let written = serde_json::to_value(&migrated).unwrap();
        assert!(written.get("max_capacity").is_none());
        assert!(written.get("password").is_none());
        assert_eq!(written["capacity"], 30);
        assert_eq!(written["tags"][1], "kitty");
    }

    #[test]
    fn test_pathless_record_resolves_against_root() {
        let record: GalleryRecord = serde_json::from_str(r#"{"name": "dogs"}"#).unwrap();
        assert_eq!(record.capacity, 200);
        assert_eq!(record.creator_id, "unknown");

        let migrated = record.clone().migrate(Some(Path::new("/srv/galleries"))).unwrap();
        assert_eq!(migrated.path, PathBuf::from("/srv/galleries/dogs"));
        assert!(record.migrate(None).is_none());
    }

    #[test]
    fn test_name_follows_path() {
        let record = GalleryRecord {
            name: "stale".to_string(),
            ..GalleryRecord::new("/srv/galleries/fresh")
        };
        assert_eq!(record.migrate(None).unwrap().name, "fresh");
    }

    #[test]
    fn test_from_defaults() {
        let defaults = GalleryDefaults {
            capacity: 50,
            ..GalleryDefaults::default()
        };
        let record = GalleryRecord::from_defaults("/srv/galleries/birds", &defaults);
        assert_eq!(record.name, "birds");
        assert_eq!(record.capacity, 50);
        assert_eq!(record.creator_id, "new");
        assert!(record.compress);
    }
}
