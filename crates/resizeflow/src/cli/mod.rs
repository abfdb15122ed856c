//! Command handlers.

pub mod config;
pub mod ingest;
pub mod run;
pub mod status;

use std::path::Path;
use std::sync::Arc;

use resizeflow_core::metadata::JsonFileMetadataStore;
use resizeflow_core::storage::LocalBlobStore;
use resizeflow_core::{Config, Resizeflow};

/// Load from `path` if given, otherwise from the default location.
pub fn load_config(path: Option<&Path>) -> resizeflow_core::Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// Wire the pipeline over the local blob store and JSON metadata table.
pub async fn open_pipeline(config: Config) -> anyhow::Result<Resizeflow> {
    let blobs = LocalBlobStore::new(config.storage_root()).await?;
    let metadata =
        JsonFileMetadataStore::open(config.metadata_dir(), &config.pipeline.metadata_table_name)
            .await?;
    tracing::debug!(
        "Storage root {}, metadata table {}",
        blobs.root().display(),
        metadata.path().display()
    );
    Ok(Resizeflow::new(config, Arc::new(blobs), Arc::new(metadata)))
}
