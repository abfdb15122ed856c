//! JSON-file backed metadata table.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::Mutex;

use super::{MetadataStore, MetadataStoreError};
use crate::types::MetadataRecord;

/// Stores a table as `{dir}/{table}.json`, one JSON object keyed by identity.
///
/// Every write rewrites the whole file through a temp file and rename. Writes
/// are serialized through a lock so concurrent instances never lose updates.
pub struct JsonFileMetadataStore {
    table: String,
    path: PathBuf,
    write_lock: Mutex<()>,
}

type Table = BTreeMap<String, MetadataRecord>;

impl JsonFileMetadataStore {
    /// Open (or lazily create) the table file under `dir`.
    pub async fn open(dir: impl AsRef<Path>, table: &str) -> Result<Self, MetadataStoreError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).await.map_err(|e| {
            MetadataStoreError::Unavailable(format!(
                "Cannot create metadata directory {}: {}",
                dir.display(),
                e
            ))
        })?;
        Ok(Self {
            table: table.to_string(),
            path: dir.join(format!("{}.json", table)),
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Table, MetadataStoreError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Table::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Table::new());
        }
        serde_json::from_str(&content).map_err(|e| MetadataStoreError::Corrupt {
            table: self.table.clone(),
            message: e.to_string(),
        })
    }

    async fn save(&self, table: &Table) -> Result<(), MetadataStoreError> {
        let json = serde_json::to_vec_pretty(table).map_err(|e| MetadataStoreError::Corrupt {
            table: self.table.clone(),
            message: e.to_string(),
        })?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for JsonFileMetadataStore {
    fn table(&self) -> &str {
        &self.table
    }

    async fn put(&self, identity: &str, record: MetadataRecord) -> Result<(), MetadataStoreError> {
        let _guard = self.write_lock.lock().await;
        let mut table = self.load().await?;
        table.insert(identity.to_string(), record);
        self.save(&table).await
    }

    async fn get(&self, identity: &str) -> Result<Option<MetadataRecord>, MetadataStoreError> {
        let _guard = self.write_lock.lock().await;
        Ok(self.load().await?.remove(identity))
    }
}
