//! Error types for the bind library

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the bind library
#[derive(Error, Debug)]
pub enum Error {
    /// PDF processing error
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Image metadata error
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// Selected or dropped path is not a directory
    #[error("Not a folder: {}", .0.display())]
    NotADirectory(PathBuf),

    /// Directory holds no JPEG images
    #[error("No JPEG images found in {}", .0.display())]
    NoImages(PathBuf),

    /// No folder has been selected yet
    #[error("No folder selected")]
    NoFolderSelected,

    /// File content is not JPEG
    #[error("Not a JPEG image: {}", .0.display())]
    NotJpeg(PathBuf),

    /// JPEG header could not be decoded
    #[error("Failed to decode {}: {source}", .path.display())]
    ImageDecode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// File not found
    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Invalid PDF (no pages)
    #[error("PDF has no pages: {}", .0.display())]
    EmptyPdf(PathBuf),

    /// Invalid option value
    #[error("Invalid option: {0}")]
    InvalidOption(String),

    /// General error
    #[error("{0}")]
    General(String),
}
