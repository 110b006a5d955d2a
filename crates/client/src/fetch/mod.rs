//! Remote source fetching with safety limits.
//!
//! Source URLs come from request parameters, so the fetch path treats them
//! as hostile input: canonicalization, an SSRF gate on IP-literal hosts, a
//! redirect cap, a timeout, and a byte ceiling all apply before bytes are
//! handed to the transform step.

pub mod ssrf;
pub mod url;

use std::time::{Duration, Instant};

use bytes::Bytes;
use reqwest::{Client, StatusCode, header};

pub use ssrf::SsrfError;
pub use url::UrlError;

/// Errors from the fetch pipeline. The pipeline maps all of them to its
/// source-unavailable failure; the variants exist for logging fidelity.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    InvalidUrl(#[from] UrlError),

    #[error(transparent)]
    Blocked(#[from] SsrfError),

    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("unexpected status {0}")]
    HttpStatus(StatusCode),

    #[error("{size} bytes exceeds limit of {limit}")]
    TooLarge { size: usize, limit: usize },
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string.
    pub user_agent: String,

    /// Maximum response body size in bytes.
    pub max_bytes: usize,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "prism/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20_000),
            max_redirects: 5,
        }
    }
}

/// An original image fetched from a remote address.
#[derive(Debug, Clone)]
pub struct FetchedImage {
    /// The canonicalized URL that was requested.
    pub url: reqwest::Url,
    /// Content-Type header, when the origin sent one.
    pub content_type: Option<String>,
    /// Image bytes.
    pub bytes: Bytes,
    /// Time taken to fetch in milliseconds.
    pub fetch_ms: u64,
}

/// HTTP fetch client with safety checks.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| FetchError::ClientBuild(e.to_string()))?;

        Ok(Self { http, config })
    }

    /// Fetch a source image, returning raw bytes and metadata.
    pub async fn fetch(&self, url_str: &str) -> Result<FetchedImage, FetchError> {
        let start = Instant::now();
        let url = url::canonicalize(url_str)?;
        ssrf::validate_url(&url)?;

        let response = self
            .http
            .get(url.as_str())
            .header("Accept", "image/*,*/*;q=0.8")
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status));
        }

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { size: len as usize, limit: self.config.max_bytes });
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { size: bytes.len(), limit: self.config.max_bytes });
        }

        let fetch_ms = start.elapsed().as_millis() as u64;

        tracing::debug!(url = %url, bytes = bytes.len(), elapsed_ms = fetch_ms, "fetched source image");

        Ok(FetchedImage { url, content_type, bytes, fetch_ms })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }
}
