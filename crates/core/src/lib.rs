//! Core types and shared functionality for prism.
//!
//! This crate provides:
//! - The request/artifact data model
//! - Request signature generation and verification
//! - Shard path derivation for destination storage layout
//! - The cache index (key -> stored path) with SQLite and in-memory backends
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod index;
pub mod request;
pub mod shard;
pub mod signature;

pub use error::Error;
pub use index::CacheIndex;
pub use request::{ImageArtifact, ImageRequest};
pub use shard::ShardConfig;
