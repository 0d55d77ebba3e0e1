//! Image resource loading
//!
//! The extractor only needs raw encoded bytes for a URL. [`HttpImageLoader`]
//! fetches them over HTTP(S); tests and embedders can supply any other
//! [`ImageLoader`].

use bytes::{Bytes, BytesMut};
use std::future::Future;
use std::time::Duration;

use crate::error::{ImageError, Result};

pub trait ImageLoader: Send + Sync {
    /// Encoded image bytes for `url`
    fn load(&self, url: &str) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Body cap applied by [`HttpImageLoader::new`]
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct HttpImageLoader {
    client: reqwest::Client,
    max_bytes: usize,
}

impl HttpImageLoader {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("marketnav/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .map_err(|e| ImageError::Fetch(e.to_string()))?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }

    /// Reject response bodies larger than `max_bytes`
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }
}

impl ImageLoader for HttpImageLoader {
    async fn load(&self, url: &str) -> Result<Bytes> {
        let limit = self.max_bytes;
        let mut response = self.client.get(url).send().await?.error_for_status()?;
        if response.content_length().is_some_and(|len| len > limit as u64) {
            return Err(ImageError::TooLarge { limit });
        }

        // Content-Length is advisory
        let mut body = BytesMut::new();
        while let Some(chunk) = response.chunk().await? {
            if body.len() + chunk.len() > limit {
                return Err(ImageError::TooLarge { limit });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body.freeze())
    }
}
