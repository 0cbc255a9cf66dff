// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the photo saver

use thiserror::Error;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main error type
#[derive(Debug, Error)]
pub enum AppError {
    /// Photo finishing and persistence errors
    #[error("Photo error: {0}")]
    Photo(#[from] PhotoError),
    /// Metadata transcoding errors
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// Storage/filesystem errors
    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),
}

/// Errors raised while finishing or persisting a photo
#[derive(Debug, Error)]
pub enum PhotoError {
    /// Source bytes could not be interpreted as a raster
    #[error("Decoding failed: {0}")]
    DecodeFailed(String),
    /// The finished raster could not be encoded
    #[error("Encoding failed: {0}")]
    EncodingFailed(String),
    /// Destination could not be opened or written
    #[error("Save failed: {0}")]
    SaveFailed(String),
    /// The raw encoder reported an error
    #[error("Raw encoding failed: {0}")]
    RawEncodingFailed(String),
    /// The save worker is no longer accepting requests
    #[error("Save queue is closed")]
    QueueClosed,
}

/// Errors raised while reading or writing EXIF metadata
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Failed to read metadata: {0}")]
    Read(#[from] exif::Error),
    #[error("Failed to write metadata: {0}")]
    Write(String),
    #[error("Metadata writer panicked")]
    WriterPanicked,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while loading the saver configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl From<std::io::Error> for PhotoError {
    fn from(err: std::io::Error) -> Self {
        PhotoError::SaveFailed(err.to_string())
    }
}

impl From<image::ImageError> for PhotoError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::Decoding(e) => PhotoError::DecodeFailed(e.to_string()),
            image::ImageError::IoError(e) => PhotoError::SaveFailed(e.to_string()),
            other => PhotoError::EncodingFailed(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_become_save_failures() {
        let err: PhotoError = std::io::Error::other("disk full").into();
        assert!(matches!(err, PhotoError::SaveFailed(ref msg) if msg.contains("disk full")));
    }

    #[test]
    fn app_error_display_names_the_area() {
        let err = AppError::from(PhotoError::QueueClosed);
        assert_eq!(err.to_string(), "Photo error: Save queue is closed");
    }
}
