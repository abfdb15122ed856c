use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MetadataStore, MetadataStoreError};
use crate::types::MetadataRecord;

/// In-memory metadata table.
pub struct MemoryMetadataStore {
    table: String,
    records: RwLock<HashMap<String, MetadataRecord>>,
}

impl MemoryMetadataStore {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            records: RwLock::new(HashMap::new()),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl MetadataStore for MemoryMetadataStore {
    fn table(&self) -> &str {
        &self.table
    }

    async fn put(&self, identity: &str, record: MetadataRecord) -> Result<(), MetadataStoreError> {
        self.records
            .write()
            .await
            .insert(identity.to_string(), record);
        Ok(())
    }

    async fn get(&self, identity: &str) -> Result<Option<MetadataRecord>, MetadataStoreError> {
        Ok(self.records.read().await.get(identity).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ImageStatus;

    #[tokio::test]
    async fn test_upsert_keeps_one_record() {
        let store = MemoryMetadataStore::new("images");
        store
            .put("img1", MetadataRecord::new("img1", ImageStatus::Received))
            .await
            .unwrap();
        store
            .put("img1", MetadataRecord::new("img1", ImageStatus::Resized))
            .await
            .unwrap();

        assert_eq!(store.len().await, 1);
        let record = store.get("img1").await.unwrap().unwrap();
        assert_eq!(record.status, ImageStatus::Resized);
    }

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let store = MemoryMetadataStore::new("images");
        assert!(store.get("nope").await.unwrap().is_none());
        assert!(store.is_empty().await);
    }
}
