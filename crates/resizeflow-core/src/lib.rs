//! resizeflow core - event-driven image ingest pipeline.
//!
//! An uploaded image is validated, resized to a fixed size, and has its
//! processing status recorded. A per-instance state machine sequences the
//! stages and owns the retry policy.
//!
//! # Architecture
//!
//! ```text
//! notification → IngestTrigger → WorkflowEngine → PipelineCoordinator
//!                                                   ├─ Validator
//!                                                   ├─ Transformer      (BlobStore)
//!                                                   └─ MetadataRecorder (MetadataStore)
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use resizeflow_core::{Config, Resizeflow};
//! use resizeflow_core::metadata::MemoryMetadataStore;
//! use resizeflow_core::storage::MemoryBlobStore;
//!
//! #[tokio::main]
//! async fn main() -> resizeflow_core::Result<()> {
//!     let config = Config::load()?;
//!     let flow = Resizeflow::new(
//!         config,
//!         Arc::new(MemoryBlobStore::new()),
//!         Arc::new(MemoryMetadataStore::new("ImagePipeline-Metadata")),
//!     );
//!
//!     let report = flow.process("uploads", "cat.jpg").await?;
//!     println!("{}: {}", report.identity, report.state);
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod config;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod storage;
pub mod trigger;
pub mod types;

// Re-exports for convenient access
pub use config::Config;
pub use error::{
    ConfigError, EngineError, PipelineError, PipelineResult, ResizeflowError, Result, StageError,
    TransitionError, TriggerError,
};
pub use pipeline::{
    InProcessEngine, InstanceHandle, PipelineCoordinator, PipelineState, WorkflowEngine,
    WorkflowInput,
};
pub use trigger::{IngestTrigger, NotificationEvent};
pub use types::{
    Dimensions, ImageReference, ImageStatus, Location, MetadataRecord, PipelineReport,
    TransformOutcome, ValidationResult,
};

use std::sync::Arc;

use metadata::MetadataStore;
use storage::BlobStore;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// A fully wired pipeline: coordinator, in-process engine, and trigger over
/// the given collaborators.
pub struct Resizeflow {
    config: Config,
    engine: Arc<InProcessEngine>,
    trigger: IngestTrigger,
    metadata: Arc<dyn MetadataStore>,
}

impl Resizeflow {
    pub fn new(
        config: Config,
        blobs: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        tracing::debug!("Initializing resizeflow v{}", VERSION);
        let coordinator = PipelineCoordinator::new(&config, blobs, Arc::clone(&metadata));
        let engine = Arc::new(InProcessEngine::new(Arc::new(coordinator)));
        let trigger = IngestTrigger::new(engine.clone());
        Self {
            config,
            engine,
            trigger,
            metadata,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &InProcessEngine {
        &self.engine
    }

    pub fn trigger(&self) -> &IngestTrigger {
        &self.trigger
    }

    /// Start an instance for one object and wait for it.
    ///
    /// If the identity already completed, its archived report is returned
    /// instead; while another run is still going this is `None`.
    pub async fn process(&self, bucket: &str, key: &str) -> Result<Option<PipelineReport>> {
        let handle = self
            .engine
            .start_instance(WorkflowInput::new(bucket, key))
            .await?;
        if handle.is_started() {
            Ok(handle.wait().await)
        } else {
            Ok(self.engine.report(handle.identity()))
        }
    }

    /// Stored metadata record for an identity.
    pub async fn status(&self, identity: &str) -> Result<Option<MetadataRecord>> {
        Ok(self.metadata.get(identity).await?)
    }

    /// Cancel running instances between stages and refuse new ones.
    pub fn shutdown(&self) {
        self.engine.shutdown();
    }
}
