//! Preprocessing Error Types

use thiserror::Error;

/// Errors while turning bytes into a tensor
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// No bytes were supplied
    #[error("Image data is empty")]
    Empty,

    /// Bytes do not start with any known image signature
    #[error("Unrecognized image format")]
    UnknownFormat,

    /// Recognized container, unreadable contents
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),
}
