pub mod archive;
pub mod core;
pub mod error;
pub mod queries;

pub use core::{GalleryManager, KeywordIndex};
pub use error::ManagerError;

#[cfg(test)]
mod tests;
