//! Variant persistence: destination storage write followed by the index
//! record, synchronously or through a bounded background queue.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use prism_client::ObjectStorage;
use prism_core::{CacheIndex, Error, ImageArtifact};

/// Persists computed variants.
///
/// The storage write always precedes the index record so an index entry is
/// never visible before its object exists.
pub struct CacheWriter {
    dest: Arc<dyn ObjectStorage>,
    index: CacheIndex,
}

impl CacheWriter {
    pub fn new(dest: Arc<dyn ObjectStorage>, index: CacheIndex) -> Self {
        Self { dest, index }
    }

    /// Write the artifact to destination storage, then record its path.
    ///
    /// A storage failure short-circuits before the index write; either
    /// failure is reported to the caller.
    pub async fn persist(&self, artifact: &ImageArtifact) -> Result<(), Error> {
        let Some(bytes) = &artifact.bytes else {
            return Err(Error::Storage(format!(
                "artifact {} has no bytes to persist",
                artifact.key
            )));
        };

        self.dest
            .save(&artifact.stored_path, bytes.clone(), artifact.content_type.as_deref())
            .await
            .map_err(|e| Error::Storage(e.to_string()))?;

        tracing::info!(key = %artifact.key, path = %artifact.stored_path, "saved variant to storage");

        self.index.record(&artifact.key, &artifact.stored_path).await
    }
}

/// Bounded queue of detached persistence work.
///
/// A fixed worker pool drains the queue; a failed detached persist is
/// logged with the artifact key rather than surfaced, since the response
/// has already been returned.
pub struct PersistQueue {
    tx: mpsc::Sender<ImageArtifact>,
    workers: Vec<JoinHandle<()>>,
}

impl PersistQueue {
    /// Spawn `workers` tasks draining a queue of `depth` slots.
    pub fn start(writer: Arc<CacheWriter>, depth: usize, workers: usize) -> Self {
        let (tx, rx) = mpsc::channel::<ImageArtifact>(depth);
        let rx = Arc::new(Mutex::new(rx));

        let handles = (0..workers)
            .map(|_| {
                let writer = writer.clone();
                let rx = rx.clone();
                tokio::spawn(async move {
                    loop {
                        let artifact = rx.lock().await.recv().await;
                        match artifact {
                            Some(artifact) => {
                                if let Err(err) = writer.persist(&artifact).await {
                                    tracing::error!(
                                        key = %artifact.key,
                                        path = %artifact.stored_path,
                                        error = %err,
                                        "detached persist failed"
                                    );
                                }
                            }
                            None => break,
                        }
                    }
                })
            })
            .collect();

        Self { tx, workers: handles }
    }

    /// Hand an artifact to the queue without blocking.
    ///
    /// A full or closed queue drops the cache write for this artifact; the
    /// drop is logged, and a later identical request simply recomputes.
    pub fn enqueue(&self, artifact: ImageArtifact) {
        match self.tx.try_send(artifact) {
            Ok(()) => {}
            Err(TrySendError::Full(artifact)) => {
                tracing::error!(key = %artifact.key, "persist queue full, dropping cache write");
            }
            Err(TrySendError::Closed(artifact)) => {
                tracing::error!(key = %artifact.key, "persist queue closed, dropping cache write");
            }
        }
    }

    /// Close the queue and wait for in-flight persists to finish.
    pub async fn shutdown(self) {
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.await;
        }
    }
}
