//! Transform engine contract.
//!
//! The pipeline treats the actual pixel work as a black box: a named
//! operation plus its options applied to source bytes, producing new image
//! bytes. Embedders supply the implementation; this crate only defines the
//! contract and maps its failures into the pipeline's error taxonomy.

use std::collections::BTreeMap;

use async_trait::async_trait;
use bytes::Bytes;

use prism_core::Error;

use crate::resolver::SourceImage;

/// A transformed variant produced by an engine.
#[derive(Debug, Clone)]
pub struct TransformedImage {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// Applies a named operation with given options to a source image.
///
/// Implementations must be deterministic for identical inputs: concurrent
/// misses for one key may run the same transform twice, and the resulting
/// writes are only interchangeable when the outputs match.
#[async_trait]
pub trait TransformEngine: Send + Sync {
    /// Apply `operation` with `parameters` to `source`.
    ///
    /// Invalid parameters, unsupported operations, and corrupt input all
    /// surface as `Error::TransformFailed`.
    async fn apply(
        &self, operation: &str, parameters: &BTreeMap<String, String>, source: &SourceImage,
    ) -> Result<TransformedImage, Error>;
}
