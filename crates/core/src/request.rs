//! Request and artifact data model.
//!
//! An [`ImageRequest`] describes one inbound transform request in
//! transport-agnostic form: a flat parameter map already stripped of any
//! routing concerns. An [`ImageArtifact`] is the resolved result, either a
//! lightweight path reference or a fully loaded variant.

use std::collections::BTreeMap;

use bytes::Bytes;
use sha2::{Digest, Sha256};

use crate::Error;
use crate::signature::{SIGNATURE_PARAM, serialize_params};

/// Parameter names consumed by the request envelope itself. Everything else
/// is an operation-specific option (width, height, quality, ...).
const RESERVED_PARAMS: &[&str] = &["op", "url", "path", "fmt", "key", SIGNATURE_PARAM];

/// One inbound transform request. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct ImageRequest {
    /// Stable cache-lookup identifier, a hash of the normalized parameters
    /// unless the caller supplied one explicitly.
    pub key: String,
    /// Named transform operation (resize, crop, ...).
    pub operation: String,
    /// Operation-specific options.
    pub parameters: BTreeMap<String, String>,
    /// Remote source address; mutually exclusive with `source_path`.
    pub source_url: Option<String>,
    /// Path within the configured source storage.
    pub source_path: Option<String>,
    /// Explicit output format override.
    pub format: Option<String>,
}

impl ImageRequest {
    /// Build a request from a flat parameter map.
    ///
    /// Recognized envelope parameters: `op` (required), exactly one of
    /// `url`/`path`, optional `fmt`, optional explicit `key`, and the `sig`
    /// carrier which never reaches the request. Remaining entries become
    /// operation options.
    pub fn from_params(params: &BTreeMap<String, String>) -> Result<Self, Error> {
        let operation = params
            .get("op")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| Error::InvalidRequest("missing operation parameter".into()))?
            .clone();

        let source_url = params.get("url").filter(|v| !v.is_empty()).cloned();
        let source_path = params.get("path").filter(|v| !v.is_empty()).cloned();

        match (&source_url, &source_path) {
            (None, None) => {
                return Err(Error::InvalidRequest(
                    "one of url or path must be provided".into(),
                ));
            }
            (Some(_), Some(_)) => {
                return Err(Error::InvalidRequest(
                    "url and path are mutually exclusive".into(),
                ));
            }
            _ => {}
        }

        let key = match params.get("key").filter(|v| !v.is_empty()) {
            Some(key) => key.clone(),
            None => derive_key(params),
        };

        let parameters = params
            .iter()
            .filter(|(name, _)| !RESERVED_PARAMS.contains(&name.as_str()))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();

        Ok(Self {
            key,
            operation,
            parameters,
            source_url,
            source_path,
            format: params.get("fmt").filter(|v| !v.is_empty()).cloned(),
        })
    }
}

/// Derive a stable cache key from normalized request parameters.
///
/// The signature carrier is excluded so that signed and unsigned forms of
/// the same request resolve to the same variant.
pub fn derive_key(params: &BTreeMap<String, String>) -> String {
    let normalized: BTreeMap<String, String> = params
        .iter()
        .filter(|(name, _)| name.as_str() != SIGNATURE_PARAM)
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(serialize_params(&normalized).as_bytes());
    hex::encode(hasher.finalize())
}

/// The resolved result of one request: a stored variant, optionally loaded
/// into memory.
#[derive(Debug, Clone)]
pub struct ImageArtifact {
    /// The request key this variant answers.
    pub key: String,
    /// Location within destination storage.
    pub stored_path: String,
    /// Variant bytes; populated on a miss or when a hit was loaded.
    pub bytes: Option<Bytes>,
    /// Content type of the variant when known.
    pub content_type: Option<String>,
}

impl ImageArtifact {
    /// A lightweight reference carrying only the stored path.
    pub fn reference(key: impl Into<String>, stored_path: impl Into<String>) -> Self {
        Self { key: key.into(), stored_path: stored_path.into(), bytes: None, content_type: None }
    }

    /// A fully loaded artifact.
    pub fn loaded(
        key: impl Into<String>, stored_path: impl Into<String>, bytes: Bytes,
        content_type: Option<String>,
    ) -> Self {
        Self { key: key.into(), stored_path: stored_path.into(), bytes: Some(bytes), content_type }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_from_params_path_source() {
        let request =
            ImageRequest::from_params(&params(&[("op", "resize"), ("path", "orig/a.jpg"), ("w", "100")]))
                .unwrap();
        assert_eq!(request.operation, "resize");
        assert_eq!(request.source_path.as_deref(), Some("orig/a.jpg"));
        assert!(request.source_url.is_none());
        assert_eq!(request.parameters.get("w").map(String::as_str), Some("100"));
        assert_eq!(request.key.len(), 64);
    }

    #[test]
    fn test_from_params_url_source() {
        let request = ImageRequest::from_params(&params(&[
            ("op", "thumbnail"),
            ("url", "https://example.com/a.png"),
        ]))
        .unwrap();
        assert_eq!(request.source_url.as_deref(), Some("https://example.com/a.png"));
        assert!(request.source_path.is_none());
    }

    #[test]
    fn test_from_params_missing_operation() {
        let result = ImageRequest::from_params(&params(&[("path", "a.jpg")]));
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_from_params_missing_source() {
        let result = ImageRequest::from_params(&params(&[("op", "resize")]));
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_from_params_both_sources_rejected() {
        let result = ImageRequest::from_params(&params(&[
            ("op", "resize"),
            ("path", "a.jpg"),
            ("url", "https://example.com/a.jpg"),
        ]));
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
    }

    #[test]
    fn test_from_params_explicit_key_wins() {
        let request =
            ImageRequest::from_params(&params(&[("op", "resize"), ("path", "a.jpg"), ("key", "k1")]))
                .unwrap();
        assert_eq!(request.key, "k1");
    }

    #[test]
    fn test_from_params_explicit_format() {
        let request =
            ImageRequest::from_params(&params(&[("op", "resize"), ("path", "a.jpg"), ("fmt", "webp")]))
                .unwrap();
        assert_eq!(request.format.as_deref(), Some("webp"));
    }

    #[test]
    fn test_derive_key_stable() {
        let p = params(&[("op", "resize"), ("path", "a.jpg"), ("w", "100")]);
        assert_eq!(derive_key(&p), derive_key(&p));
    }

    #[test]
    fn test_derive_key_ignores_signature() {
        let mut p = params(&[("op", "resize"), ("path", "a.jpg")]);
        let bare = derive_key(&p);
        p.insert("sig".to_string(), "deadbeef".to_string());
        assert_eq!(derive_key(&p), bare);
    }

    #[test]
    fn test_derive_key_sensitive_to_options() {
        let p1 = params(&[("op", "resize"), ("path", "a.jpg"), ("w", "100")]);
        let p2 = params(&[("op", "resize"), ("path", "a.jpg"), ("w", "200")]);
        assert_ne!(derive_key(&p1), derive_key(&p2));
    }

    #[test]
    fn test_artifact_reference_has_no_bytes() {
        let artifact = ImageArtifact::reference("k1", "a/b/c.png");
        assert!(artifact.bytes.is_none());
        assert!(artifact.content_type.is_none());
        assert_eq!(artifact.stored_path, "a/b/c.png");
    }
}
