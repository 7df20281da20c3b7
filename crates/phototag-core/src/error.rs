use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Custom error types for the phototag library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catalog file could not be encoded or decoded
    #[error("Catalog format error: {0}")]
    Json(#[from] serde_json::Error),

    /// Image processing error
    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// EXIF block missing or malformed
    #[error("EXIF parsing error: {0}")]
    Exif(#[from] exif::Error),

    /// Directory traversal error
    #[error("Directory walk error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// File not found error
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Operation referenced a path the catalog does not contain
    #[error("Photo not in catalog: {0}")]
    PhotoNotFound(PathBuf),

    /// Invalid configuration error
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A background task ended without delivering its result
    #[error("Background task failed: {0}")]
    Task(String),
}
