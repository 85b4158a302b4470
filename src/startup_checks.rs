use crate::Config;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum StartupCheckError {
    #[error("Failed to create gallery root {0}: {1}")]
    RootCreationFailed(String, std::io::Error),

    #[error("Gallery root is not accessible: {0}")]
    RootNotAccessible(String),

    #[error("Gallery root is not a directory: {0}")]
    RootNotDirectory(String),

    #[error("No gallery roots configured")]
    NoRoots,

    #[error("Failed to create store directory {0}: {1}")]
    StoreDirectoryCreationFailed(String, std::io::Error),
}

pub async fn perform_startup_checks(config: &Config) -> Result<(), Vec<StartupCheckError>> {
    let mut errors = Vec::new();

    info!("Performing startup checks...");

    if config.storage.roots.is_empty() {
        error!("No gallery roots configured");
        errors.push(StartupCheckError::NoRoots);
    }

    for root in &config.storage.roots {
        let display = root.display().to_string();
        if !root.exists() {
            info!("Gallery root does not exist, creating: {:?}", root);
            if let Err(e) = tokio::fs::create_dir_all(root).await {
                error!("Failed to create gallery root {:?}: {}", root, e);
                errors.push(StartupCheckError::RootCreationFailed(display, e));
                continue;
            }
        }

        if !root.is_dir() {
            error!("Gallery root is not a directory: {:?}", root);
            errors.push(StartupCheckError::RootNotDirectory(display));
            continue;
        }

        match tokio::fs::read_dir(root).await {
            Ok(_) => info!("Gallery root is accessible: {:?}", root),
            Err(e) => {
                error!("Gallery root is not accessible: {:?}: {}", root, e);
                errors.push(StartupCheckError::RootNotAccessible(display));
            }
        }
    }

    let store_dir = config
        .storage
        .store_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if !store_dir.exists() {
        warn!("Store directory does not exist, creating: {:?}", store_dir);
        if let Err(e) = tokio::fs::create_dir_all(store_dir).await {
            error!("Failed to create store directory {:?}: {}", store_dir, e);
            errors.push(StartupCheckError::StoreDirectoryCreationFailed(
                store_dir.display().to_string(),
                e,
            ));
        }
    }

    if errors.is_empty() {
        info!("All startup checks passed");
        Ok(())
    } else {
        error!("Startup checks failed with {} errors", errors.len());
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_roots_are_created() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.roots = vec![temp.path().join("a"), temp.path().join("b/c")];
        config.storage.store_file = temp.path().join("state/store.json");

        perform_startup_checks(&config).await.unwrap();

        assert!(temp.path().join("a").is_dir());
        assert!(temp.path().join("b/c").is_dir());
        assert!(temp.path().join("state").is_dir());
    }

    #[tokio::test]
    async fn test_file_as_root_fails() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not_a_dir");
        std::fs::write(&file, b"x").unwrap();

        let mut config = Config::default();
        config.storage.roots = vec![file];
        config.storage.store_file = temp.path().join("store.json");

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], StartupCheckError::RootNotDirectory(_)));
    }

    #[tokio::test]
    async fn test_no_roots() {
        let temp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.roots.clear();
        config.storage.store_file = temp.path().join("store.json");

        let errors = perform_startup_checks(&config).await.unwrap_err();
        assert!(matches!(errors[0], StartupCheckError::NoRoots));
    }
}
