use std::time::Duration;
use thiserror::Error;

/// Failure to obtain features for one image.
///
/// Every variant is local to a single product: the scorer falls back to
/// text-only scoring for it and carries on.
#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Product has no image URL")]
    MissingImage,

    #[error("Image fetch failed: {0}")]
    Fetch(String),

    #[error("Image server returned status {0}")]
    Status(u16),

    #[error("Image decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("Image body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("Image has zero width or height")]
    Empty,

    #[error("Image extraction timed out after {0:?}")]
    Timeout(Duration),

    #[error("Decode worker failed: {0}")]
    Worker(String),
}

impl From<reqwest::Error> for ImageError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => ImageError::Status(status.as_u16()),
            None => ImageError::Fetch(err.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for ImageError {
    fn from(err: tokio::task::JoinError) -> Self {
        ImageError::Worker(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ImageError>;
