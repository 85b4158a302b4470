use crate::gallery::GalleryError;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Store error: {0}")]
    StoreError(#[from] StoreError),

    #[error("Gallery error: {0}")]
    GalleryError(#[from] GalleryError),

    #[error("Background task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),
}
