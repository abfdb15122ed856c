//! Key-value metadata store keyed by image identity.

mod file;
mod memory;

pub use file::JsonFileMetadataStore;
pub use memory::MemoryMetadataStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::MetadataRecord;

/// Metadata store errors
#[derive(Debug, Error)]
pub enum MetadataStoreError {
    #[error("Metadata store unavailable: {0}")]
    Unavailable(String),

    #[error("Corrupt metadata table {table}: {message}")]
    Corrupt { table: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Upsert-only record store.
///
/// `put` must be idempotent: one record per identity, last write wins.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Table name for logging.
    fn table(&self) -> &str;

    async fn put(&self, identity: &str, record: MetadataRecord) -> Result<(), MetadataStoreError>;

    async fn get(&self, identity: &str) -> Result<Option<MetadataRecord>, MetadataStoreError>;
}
