use thiserror::Error;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Background task failed: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Gallery path has no usable directory name: {0}")]
    InvalidPath(String),
}
