//! The prism resolution pipeline: request authorization, cache-aside
//! lookup, miss-path source fetch + transform, and variant persistence.

pub mod engine;
pub mod pipeline;
pub mod resolver;
pub mod writer;

pub use engine::{TransformEngine, TransformedImage};
pub use pipeline::{Pipeline, PipelineSettings, ResolveOptions};
pub use resolver::{SourceImage, SourceResolver};
pub use writer::{CacheWriter, PersistQueue};
