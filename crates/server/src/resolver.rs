//! Source resolution: obtaining original image bytes for a request.
//!
//! A request names its source either as a remote URL or as a path within
//! the configured source storage. Every failure on this path surfaces as
//! `Error::SourceUnavailable`; the pipeline never substitutes a placeholder.

use std::sync::Arc;

use bytes::Bytes;

use prism_client::{FetchClient, ObjectStorage};
use prism_core::{Error, ImageRequest};

/// An original image held in memory, ready for transformation.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

impl SourceImage {
    /// Size of the source in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Resolves a request's source image from a remote URL or source storage.
pub struct SourceResolver {
    fetch: FetchClient,
    source_storage: Arc<dyn ObjectStorage>,
}

impl SourceResolver {
    pub fn new(fetch: FetchClient, source_storage: Arc<dyn ObjectStorage>) -> Self {
        Self { fetch, source_storage }
    }

    /// Fetch the original image named by the request.
    pub async fn resolve(&self, request: &ImageRequest) -> Result<SourceImage, Error> {
        if let Some(url) = &request.source_url {
            let fetched = self
                .fetch
                .fetch(url)
                .await
                .map_err(|e| Error::SourceUnavailable(e.to_string()))?;
            return Ok(SourceImage { bytes: fetched.bytes, content_type: fetched.content_type });
        }

        if let Some(path) = &request.source_path {
            let bytes = self
                .source_storage
                .open(path)
                .await
                .map_err(|e| Error::SourceUnavailable(e.to_string()))?;
            let content_type = mime_guess::from_path(path).first().map(|m| m.to_string());
            return Ok(SourceImage { bytes, content_type });
        }

        Err(Error::InvalidRequest("request names no source".into()))
    }
}
