//! The resolution pipeline: cache-aside orchestration of one request.
//!
//! On each request the pipeline consults the cache index; on a miss it
//! drives source resolution, the transform engine, and the cache writer,
//! returning the resulting artifact either way. All collaborators are
//! injected at construction; the pipeline itself holds no global state.

use std::collections::BTreeMap;
use std::sync::Arc;

use prism_client::ObjectStorage;
use prism_core::shard::{ShardConfig, shard_path};
use prism_core::{CacheIndex, Error, ImageArtifact, ImageRequest, signature};

use crate::engine::TransformEngine;
use crate::resolver::SourceResolver;
use crate::writer::{CacheWriter, PersistQueue};

/// Per-request behavior flags.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOptions {
    /// Persist the miss-path side effect without blocking the response.
    pub async_write: bool,
    /// On a hit, load the variant bytes instead of returning a reference.
    pub load: bool,
}

/// Process-wide pipeline settings, fixed at startup.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub shard: ShardConfig,
    pub default_format: String,
    pub secret_key: String,
    pub queue_depth: usize,
    pub queue_workers: usize,
}

impl From<&prism_core::config::AppConfig> for PipelineSettings {
    fn from(config: &prism_core::config::AppConfig) -> Self {
        Self {
            shard: config.shard,
            default_format: config.default_format.clone(),
            secret_key: config.secret_key.clone(),
            queue_depth: config.queue_depth,
            queue_workers: config.queue_workers,
        }
    }
}

/// The request-resolution orchestrator.
pub struct Pipeline {
    index: CacheIndex,
    resolver: SourceResolver,
    dest: Arc<dyn ObjectStorage>,
    engine: Arc<dyn TransformEngine>,
    writer: Arc<CacheWriter>,
    queue: PersistQueue,
    shard: ShardConfig,
    default_format: String,
    secret_key: String,
}

impl Pipeline {
    pub fn new(
        settings: PipelineSettings, index: CacheIndex, resolver: SourceResolver,
        dest: Arc<dyn ObjectStorage>, engine: Arc<dyn TransformEngine>,
    ) -> Self {
        let writer = Arc::new(CacheWriter::new(dest.clone(), index.clone()));
        let queue = PersistQueue::start(writer.clone(), settings.queue_depth, settings.queue_workers);

        Self {
            index,
            resolver,
            dest,
            engine,
            writer,
            queue,
            shard: settings.shard,
            default_format: settings.default_format,
            secret_key: settings.secret_key,
        }
    }

    /// Authentication gate: verify the request parameters were signed by
    /// the secret holder. Runs before any cache or storage work.
    pub fn authorize(&self, params: &BTreeMap<String, String>) -> Result<(), Error> {
        if signature::verify(&self.secret_key, params) {
            Ok(())
        } else {
            tracing::warn!("rejected request with missing or mismatched signature");
            Err(Error::AuthenticationFailed)
        }
    }

    /// Deterministic destination path for a request key and output format.
    pub fn stored_path_for(&self, key: &str, format: &str) -> String {
        format!("{}.{}", shard_path(key, &self.shard), format)
    }

    /// Resolve one request to an artifact.
    ///
    /// Hit: at most one storage read (when `load` is set), zero writes.
    /// Miss: source resolve, transform, then persist with the storage write
    /// strictly before the index record; with `async_write` the persistence
    /// is queued and the artifact returned immediately.
    pub async fn resolve(
        &self, request: &ImageRequest, opts: ResolveOptions,
    ) -> Result<ImageArtifact, Error> {
        let prefixed = self.index.prefixed(&request.key);

        if let Some(stored_path) = self.index.lookup(&request.key).await {
            tracing::info!(key = %prefixed, path = %stored_path, "cache hit");

            if opts.load {
                let bytes = self
                    .dest
                    .open(&stored_path)
                    .await
                    .map_err(|e| Error::Storage(e.to_string()))?;
                let content_type =
                    mime_guess::from_path(&stored_path).first().map(|m| m.to_string());
                return Ok(ImageArtifact::loaded(&request.key, stored_path, bytes, content_type));
            }

            return Ok(ImageArtifact::reference(&request.key, stored_path));
        }

        tracing::info!(key = %prefixed, "cache miss");

        let source = self.resolver.resolve(request).await?;
        let transformed = self
            .engine
            .apply(&request.operation, &request.parameters, &source)
            .await?;

        let format = request
            .format
            .as_deref()
            .unwrap_or(&self.default_format);
        let stored_path = self.stored_path_for(&request.key, format);

        let artifact = ImageArtifact::loaded(
            &request.key,
            stored_path,
            transformed.bytes,
            transformed.content_type,
        );

        if opts.async_write {
            self.queue.enqueue(artifact.clone());
        } else {
            self.writer.persist(&artifact).await?;
        }

        Ok(artifact)
    }

    /// Close the persistence queue and wait for in-flight detached writes.
    pub async fn shutdown(self) {
        self.queue.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use bytes::Bytes;
    use prism_client::{FetchClient, FetchConfig, MemoryStorage, StorageError};
    use prism_core::index::MemoryIndex;

    use crate::engine::TransformedImage;
    use crate::resolver::SourceImage;

    /// Engine double returning fixed bytes and counting invocations.
    struct CountingEngine {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CountingEngine {
        fn new() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail: false })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { calls: AtomicUsize::new(0), fail: true })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TransformEngine for CountingEngine {
        async fn apply(
            &self, operation: &str, _parameters: &BTreeMap<String, String>, _source: &SourceImage,
        ) -> Result<TransformedImage, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::TransformFailed(format!("unsupported operation: {operation}")));
            }
            Ok(TransformedImage {
                bytes: Bytes::from_static(b"transformed"),
                content_type: Some("image/png".into()),
            })
        }
    }

    /// Destination double whose writes always fail.
    struct FailingDest;

    #[async_trait]
    impl prism_client::ObjectStorage for FailingDest {
        async fn save(
            &self, _path: &str, _bytes: Bytes, _content_type: Option<&str>,
        ) -> Result<(), StorageError> {
            Err(StorageError::Backend("disk full".into()))
        }

        async fn open(&self, path: &str) -> Result<Bytes, StorageError> {
            Err(StorageError::NotFound(path.to_string()))
        }

        async fn exists(&self, _path: &str) -> Result<bool, StorageError> {
            Ok(false)
        }
    }

    struct Harness {
        pipeline: Pipeline,
        source: Arc<MemoryStorage>,
        dest: Arc<MemoryStorage>,
        engine: Arc<CountingEngine>,
        index: CacheIndex,
    }

    fn settings(secret: &str) -> PipelineSettings {
        PipelineSettings {
            shard: ShardConfig { depth: 1, width: 1 },
            default_format: "jpg".into(),
            secret_key: secret.into(),
            queue_depth: 8,
            queue_workers: 1,
        }
    }

    fn build_pipeline(
        engine: Arc<CountingEngine>, dest: Arc<dyn ObjectStorage>, secret: &str,
    ) -> (Pipeline, Arc<MemoryStorage>, CacheIndex) {
        let source = Arc::new(MemoryStorage::new());
        let index = CacheIndex::new(Arc::new(MemoryIndex::new()), "cache:");
        let fetch = FetchClient::new(FetchConfig::default()).unwrap();
        let resolver = SourceResolver::new(fetch, source.clone());
        let pipeline = Pipeline::new(settings(secret), index.clone(), resolver, dest, engine);
        (pipeline, source, index)
    }

    fn harness_with(engine: Arc<CountingEngine>) -> Harness {
        let dest = Arc::new(MemoryStorage::new());
        let (pipeline, source, index) = build_pipeline(engine.clone(), dest.clone(), "");
        Harness { pipeline, source, dest, engine, index }
    }

    fn harness() -> Harness {
        harness_with(CountingEngine::new())
    }

    fn request(key: &str) -> ImageRequest {
        ImageRequest {
            key: key.into(),
            operation: "resize".into(),
            parameters: [("w".to_string(), "100".to_string())].into(),
            source_url: None,
            source_path: Some("orig/a.jpg".into()),
            format: None,
        }
    }

    async fn seed_source(h: &Harness) {
        h.source
            .save("orig/a.jpg", Bytes::from_static(b"original"), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_miss_then_hit_round_trip() {
        let h = harness();
        seed_source(&h).await;

        let first = h
            .pipeline
            .resolve(&request("k1"), ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(first.key, "k1");
        assert_eq!(first.stored_path, "k/1.jpg");
        assert_eq!(first.bytes.as_deref(), Some(b"transformed".as_slice()));

        // Storage then index both populated.
        assert!(h.dest.exists("k/1.jpg").await.unwrap());
        assert_eq!(h.index.lookup("k1").await.as_deref(), Some("k/1.jpg"));

        let second = h
            .pipeline
            .resolve(&request("k1"), ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(second.stored_path, "k/1.jpg");
        assert!(second.bytes.is_none());
    }

    #[tokio::test]
    async fn test_hit_path_never_reinvokes_engine() {
        let h = harness();
        seed_source(&h).await;

        for _ in 0..3 {
            h.pipeline
                .resolve(&request("k1"), ResolveOptions::default())
                .await
                .unwrap();
        }

        assert_eq!(h.engine.calls(), 1);
    }

    #[tokio::test]
    async fn test_hit_with_load_returns_bytes() {
        let h = harness();
        seed_source(&h).await;

        h.pipeline
            .resolve(&request("k1"), ResolveOptions::default())
            .await
            .unwrap();

        let hit = h
            .pipeline
            .resolve(&request("k1"), ResolveOptions { async_write: false, load: true })
            .await
            .unwrap();
        assert_eq!(hit.bytes.as_deref(), Some(b"transformed".as_slice()));
        assert_eq!(hit.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn test_explicit_format_overrides_default() {
        let h = harness();
        seed_source(&h).await;

        let mut req = request("k1");
        req.format = Some("webp".into());

        let artifact = h
            .pipeline
            .resolve(&req, ResolveOptions::default())
            .await
            .unwrap();
        assert_eq!(artifact.stored_path, "k/1.webp");
    }

    #[tokio::test]
    async fn test_source_missing_writes_nothing() {
        let h = harness();

        let result = h
            .pipeline
            .resolve(&request("k1"), ResolveOptions::default())
            .await;
        assert!(matches!(result, Err(Error::SourceUnavailable(_))));
        assert!(h.index.lookup("k1").await.is_none());
        assert_eq!(h.engine.calls(), 0);
    }

    #[tokio::test]
    async fn test_transform_failure_writes_nothing() {
        let h = harness_with(CountingEngine::failing());
        seed_source(&h).await;

        let result = h
            .pipeline
            .resolve(&request("k1"), ResolveOptions::default())
            .await;
        assert!(matches!(result, Err(Error::TransformFailed(_))));
        assert!(h.index.lookup("k1").await.is_none());
        assert_eq!(h.dest.len().await, 0);
    }

    #[tokio::test]
    async fn test_sync_persist_failure_surfaces_and_leaves_no_index_entry() {
        let (pipeline, source, index) =
            build_pipeline(CountingEngine::new(), Arc::new(FailingDest), "");
        source
            .save("orig/a.jpg", Bytes::from_static(b"original"), None)
            .await
            .unwrap();

        let result = pipeline.resolve(&request("k1"), ResolveOptions::default()).await;
        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(index.lookup("k1").await.is_none());
    }

    #[tokio::test]
    async fn test_async_write_returns_before_persist_failure() {
        let (pipeline, source, index) =
            build_pipeline(CountingEngine::new(), Arc::new(FailingDest), "");
        source
            .save("orig/a.jpg", Bytes::from_static(b"original"), None)
            .await
            .unwrap();

        // The artifact comes back even though the detached persist will
        // fail; the failure is only logged.
        let artifact = pipeline
            .resolve(&request("k1"), ResolveOptions { async_write: true, load: false })
            .await
            .unwrap();
        assert_eq!(artifact.bytes.as_deref(), Some(b"transformed".as_slice()));

        pipeline.shutdown().await;
        assert!(index.lookup("k1").await.is_none());
    }

    #[tokio::test]
    async fn test_async_write_eventually_populates_cache() {
        let h = harness();
        seed_source(&h).await;

        h.pipeline
            .resolve(&request("k1"), ResolveOptions { async_write: true, load: false })
            .await
            .unwrap();

        let index = h.index.clone();
        let dest = h.dest.clone();
        h.pipeline.shutdown().await;

        assert!(dest.exists("k/1.jpg").await.unwrap());
        assert_eq!(index.lookup("k1").await.as_deref(), Some("k/1.jpg"));
    }

    #[tokio::test]
    async fn test_authorize_empty_secret_allows_all() {
        let h = harness();
        assert!(h.pipeline.authorize(&BTreeMap::new()).is_ok());
    }

    #[tokio::test]
    async fn test_authorize_rejects_tampered_params() {
        let (pipeline, _, _) =
            build_pipeline(CountingEngine::new(), Arc::new(MemoryStorage::new()), "secret");

        let mut params: BTreeMap<String, String> =
            [("op".to_string(), "resize".to_string())].into();
        let sig = signature::sign("secret", &params);
        params.insert("sig".to_string(), sig);
        assert!(pipeline.authorize(&params).is_ok());

        params.insert("op".to_string(), "crop".to_string());
        assert!(matches!(pipeline.authorize(&params), Err(Error::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_stored_path_deterministic() {
        let h = harness();
        assert_eq!(h.pipeline.stored_path_for("abc", "png"), h.pipeline.stored_path_for("abc", "png"));
        assert_eq!(h.pipeline.stored_path_for("abc", "png"), "a/bc.png");
    }
}
