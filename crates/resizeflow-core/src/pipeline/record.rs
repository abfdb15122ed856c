//! Metadata recording stage.

use std::sync::Arc;

use crate::error::StageError;
use crate::metadata::MetadataStore;
use crate::types::{ImageStatus, MetadataRecord};

/// Upserts one status record per image identity.
pub struct MetadataRecorder {
    store: Arc<dyn MetadataStore>,
}

impl MetadataRecorder {
    pub fn new(store: Arc<dyn MetadataStore>) -> Self {
        Self { store }
    }

    /// Write `status` for `identity`. Store failures come back as
    /// [`StageError::PersistenceFailure`].
    pub async fn record(&self, identity: &str, status: ImageStatus) -> Result<(), StageError> {
        let record = MetadataRecord::new(identity, status);
        self.store.put(identity, record).await?;
        tracing::debug!(
            table = self.store.table(),
            "Recorded {} as {}",
            identity,
            status
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{MemoryMetadataStore, MetadataStoreError};
    use async_trait::async_trait;

    struct DownStore;

    #[async_trait]
    impl MetadataStore for DownStore {
        fn table(&self) -> &str {
            "down"
        }

        async fn put(&self, _: &str, _: MetadataRecord) -> Result<(), MetadataStoreError> {
            Err(MetadataStoreError::Unavailable("connection refused".to_string()))
        }

        async fn get(&self, _: &str) -> Result<Option<MetadataRecord>, MetadataStoreError> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn test_record_twice_is_idempotent() {
        let store = Arc::new(MemoryMetadataStore::new("ImagePipeline-Metadata"));
        let recorder = MetadataRecorder::new(store.clone());

        recorder.record("img1", ImageStatus::Resized).await.unwrap();
        recorder.record("img1", ImageStatus::Resized).await.unwrap();

        assert_eq!(store.len().await, 1);
        let record = store.get("img1").await.unwrap().unwrap();
        assert_eq!(record.image_key, "img1");
        assert_eq!(record.status, ImageStatus::Resized);
        assert!(record.timestamp.is_some());
    }

    #[tokio::test]
    async fn test_store_failure_is_reported() {
        let recorder = MetadataRecorder::new(Arc::new(DownStore));
        let err = recorder.record("img1", ImageStatus::Resized).await.unwrap_err();
        assert!(matches!(err, StageError::PersistenceFailure(_)));
        assert!(err.to_string().contains("connection refused"));
    }
}
