//! Blob storage abstraction.
//!
//! The pipeline reads source images from and writes resized images to a
//! [`BlobStore`]. Objects are addressed by `(container, key)`.

mod local;
mod memory;

pub use local::LocalBlobStore;
pub use memory::MemoryBlobStore;

use async_trait::async_trait;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Blob storage trait.
///
/// Implementations must be safe to share across pipeline instances.
/// `put` overwrites: writing the same key twice leaves one object.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Fetch an object's bytes. Returns [`StorageError::NotFound`] when the
    /// object does not exist.
    async fn get(&self, container: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Write an object, replacing any existing one with the same key.
    async fn put(&self, container: &str, key: &str, data: Vec<u8>) -> StorageResult<()>;
}

/// Join container and key into the `container/key` form used in messages.
pub(crate) fn object_path(container: &str, key: &str) -> String {
    format!("{}/{}", container, key)
}
