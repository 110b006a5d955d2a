//! Unified error types for prism.
//!
//! Each variant maps to one stage of the resolution pipeline: the
//! authentication gate, source acquisition, the transform step, and
//! persistence of the computed variant.

use tokio_rusqlite::rusqlite;

/// Unified error types for the prism pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed or incomplete request parameters.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Signature missing or mismatched while a secret key is configured.
    /// Raised before any cache or storage work happens.
    #[error("authentication failed: request signature missing or mismatched")]
    AuthenticationFailed,

    /// The original image could not be fetched or decoded.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The requested operation could not be applied.
    #[error("transform failed: {0}")]
    TransformFailed(String),

    /// Writing the computed variant to destination storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// The cache index could not be written.
    #[error("index error: {0}")]
    Index(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("index error: migration failed: {0}")]
    MigrationFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => {
                Error::Index(tokio_rusqlite::Error::ConnectionClosed)
            }
            tokio_rusqlite::Error::Close(c) => Error::Index(tokio_rusqlite::Error::Close(c)),
            _ => Error::Index(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Index(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Index(tokio_rusqlite::Error::Error(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::SourceUnavailable("orig/a.jpg not found".to_string());
        assert!(err.to_string().contains("source unavailable"));
        assert!(err.to_string().contains("orig/a.jpg"));
    }

    #[test]
    fn test_authentication_error_display() {
        let err = Error::AuthenticationFailed;
        assert!(err.to_string().contains("authentication failed"));
    }
}
