//! Storage-change notifications in, pipeline instances out.
//!
//! Accepts the envelope
//! `{"records": [{"storage": {"bucket": {"name": ..}, "object": {"key": ..}}}]}`
//! and the S3 spelling `{"Records": [{"s3": {...}}]}`.

use serde::Deserialize;
use std::sync::Arc;

use crate::error::TriggerError;
use crate::pipeline::engine::{InstanceHandle, WorkflowEngine, WorkflowInput};

/// A storage-change notification envelope.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationEvent {
    #[serde(alias = "Records", default)]
    pub records: Vec<NotificationRecord>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationRecord {
    #[serde(alias = "s3", default)]
    pub storage: Option<StorageEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageEntity {
    #[serde(default)]
    pub bucket: Option<BucketEntity>,
    #[serde(default)]
    pub object: Option<ObjectEntity>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BucketEntity {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ObjectEntity {
    #[serde(default)]
    pub key: Option<String>,
}

impl NotificationEvent {
    pub fn from_json(payload: &str) -> Result<Self, TriggerError> {
        Ok(serde_json::from_str(payload)?)
    }
}

impl NotificationRecord {
    /// `(bucket, key)` if both are present and non-empty.
    pub fn object(&self) -> Option<(&str, &str)> {
        let storage = self.storage.as_ref()?;
        let bucket = storage.bucket.as_ref()?.name.as_deref()?;
        let key = storage.object.as_ref()?.key.as_deref()?;
        if bucket.is_empty() || key.is_empty() {
            return None;
        }
        Some((bucket, key))
    }
}

/// Edge listener that starts one pipeline instance per notified object.
pub struct IngestTrigger {
    engine: Arc<dyn WorkflowEngine>,
}

impl IngestTrigger {
    pub fn new(engine: Arc<dyn WorkflowEngine>) -> Self {
        Self { engine }
    }

    /// Start an instance for every usable record.
    ///
    /// Records missing the bucket name or object key are logged and
    /// discarded. Duplicates (within the event or across redeliveries) come
    /// back as coalesced handles.
    pub async fn on_notification(&self, event: &NotificationEvent) -> Vec<InstanceHandle> {
        let mut handles = Vec::with_capacity(event.records.len());

        for (index, record) in event.records.iter().enumerate() {
            let Some((bucket, key)) = record.object() else {
                tracing::warn!(
                    "Discarding notification record {}: missing bucket name or object key",
                    index
                );
                continue;
            };

            tracing::debug!("Notification for {}/{}", bucket, key);
            match self
                .engine
                .start_instance(WorkflowInput::new(bucket, key))
                .await
            {
                Ok(handle) => handles.push(handle),
                Err(e) => tracing::error!("Could not start instance for {}/{}: {}", bucket, key, e),
            }
        }

        handles
    }

    /// Parse a raw JSON payload, then behave like [`Self::on_notification`].
    pub async fn on_payload(&self, payload: &str) -> Result<Vec<InstanceHandle>, TriggerError> {
        let event = NotificationEvent::from_json(payload).map_err(|e| {
            tracing::warn!("Discarding malformed notification: {}", e);
            e
        })?;
        Ok(self.on_notification(&event).await)
    }
}
