//! Workflow execution: turns start requests into coordinator runs.
//!
//! The engine adds no retries of its own; every retry decision belongs to the
//! coordinator, so attempt counts never compound across layers.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::EngineError;
use crate::types::{ImageReference, PipelineReport};

use super::coordinator::PipelineCoordinator;
use super::registry::{Claim, Coalesced, InstanceRegistry};

/// Start-instance input: the object that triggered the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowInput {
    pub bucket: String,
    pub key: String,
}

impl WorkflowInput {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

/// Handle to a start request.
#[derive(Debug)]
pub struct InstanceHandle {
    identity: String,
    inner: HandleInner,
}

#[derive(Debug)]
enum HandleInner {
    Started(JoinHandle<PipelineReport>),
    Coalesced(Coalesced),
}

impl InstanceHandle {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Whether this request started a new instance.
    pub fn is_started(&self) -> bool {
        matches!(self.inner, HandleInner::Started(_))
    }

    /// Why the request was a no-op, if it was one.
    pub fn coalesced(&self) -> Option<Coalesced> {
        match self.inner {
            HandleInner::Coalesced(reason) => Some(reason),
            HandleInner::Started(_) => None,
        }
    }

    /// Wait for the started instance and return its report. Returns `None`
    /// for coalesced requests and for runs whose task was aborted.
    pub async fn wait(self) -> Option<PipelineReport> {
        match self.inner {
            HandleInner::Started(task) => match task.await {
                Ok(report) => Some(report),
                Err(e) => {
                    tracing::error!("Instance task for {} did not finish: {}", self.identity, e);
                    None
                }
            },
            HandleInner::Coalesced(_) => None,
        }
    }
}

/// Accepts start-instance calls and schedules the coordinator.
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn start_instance(&self, input: WorkflowInput) -> Result<InstanceHandle, EngineError>;
}

/// Runs every instance as a tokio task in this process.
pub struct InProcessEngine {
    coordinator: Arc<PipelineCoordinator>,
    registry: InstanceRegistry,
    shutdown: CancellationToken,
}

impl InProcessEngine {
    pub fn new(coordinator: Arc<PipelineCoordinator>) -> Self {
        Self {
            coordinator,
            registry: InstanceRegistry::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Report of the completed run for `identity`, if there is one.
    pub fn report(&self, identity: &str) -> Option<PipelineReport> {
        self.registry.report(identity)
    }

    /// Stop accepting instances and cancel running ones between stages.
    pub fn shutdown(&self) {
        tracing::info!(
            "Shutting down engine ({} active instances)",
            self.registry.active_count()
        );
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }
}

#[async_trait]
impl WorkflowEngine for InProcessEngine {
    async fn start_instance(&self, input: WorkflowInput) -> Result<InstanceHandle, EngineError> {
        if self.is_shut_down() {
            return Err(EngineError::ShutDown);
        }

        let reference = ImageReference::new(input.bucket, input.key);
        let identity = reference.identity().to_string();

        let guard = match self.registry.claim(&identity) {
            Claim::Acquired(guard) => guard,
            Claim::Coalesced(reason) => {
                tracing::info!("Coalesced duplicate start for {} ({:?})", identity, reason);
                return Ok(InstanceHandle {
                    identity,
                    inner: HandleInner::Coalesced(reason),
                });
            }
        };

        tracing::debug!("Starting instance for {}", reference.source());
        let coordinator = Arc::clone(&self.coordinator);
        let cancel = self.shutdown.child_token();
        let task = tokio::spawn(async move {
            let report = coordinator.run_with_cancel(reference, &cancel).await;
            if report.cancelled {
                // Release the identity so a redelivery can resume it.
                drop(guard);
            } else {
                guard.finish(report.clone());
            }
            report
        });

        Ok(InstanceHandle {
            identity,
            inner: HandleInner::Started(task),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metadata::MemoryMetadataStore;
    use crate::pipeline::state::PipelineState;
    use crate::storage::MemoryBlobStore;

    fn engine() -> InProcessEngine {
        let coordinator = PipelineCoordinator::new(
            &Config::default(),
            Arc::new(MemoryBlobStore::new()),
            Arc::new(MemoryMetadataStore::new("meta")),
        );
        InProcessEngine::new(Arc::new(coordinator))
    }

    #[tokio::test]
    async fn test_invalid_run_is_not_archived_and_restartable() {
        let engine = engine();

        let handle = engine
            .start_instance(WorkflowInput::new("uploads", "notes.txt"))
            .await
            .unwrap();
        assert!(handle.is_started());
        let report = handle.wait().await.unwrap();
        assert_eq!(report.state, PipelineState::Invalid);
        assert!(engine.report("notes.txt").is_none());
        assert!(engine.registry().reports().is_empty());

        let again = engine
            .start_instance(WorkflowInput::new("uploads", "notes.txt"))
            .await
            .unwrap();
        assert!(again.is_started());
        again.wait().await;
    }

    #[tokio::test]
    async fn test_shut_down_engine_refuses_starts() {
        let engine = engine();
        engine.shutdown();

        let err = engine
            .start_instance(WorkflowInput::new("uploads", "cat.jpg"))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::ShutDown));
    }
}
