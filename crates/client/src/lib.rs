//! Outside-world collaborators for prism: remote source fetching and
//! object-storage backends.

pub mod fetch;
pub mod storage;

pub use fetch::{FetchClient, FetchConfig, FetchError, FetchedImage};
pub use storage::{MemoryStorage, ObjectStorage, StorageError};
