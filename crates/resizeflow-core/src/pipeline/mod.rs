//! Image pipeline components.
//!
//! - **validate**: extension-based eligibility check
//! - **decode**: load and decode images with limits and timeouts
//! - **transform**: fixed-size resize written to the destination container
//! - **record**: metadata status upsert
//! - **retry**: retry classification and backoff
//! - **state**: per-instance state machine
//! - **registry**: per-identity exclusion and report archive
//! - **coordinator**: sequences the stages for one instance
//! - **engine**: schedules coordinator runs

pub mod coordinator;
pub mod decode;
pub mod engine;
pub mod record;
pub mod registry;
pub mod retry;
pub mod state;
pub mod transform;
pub mod validate;

// Re-exports for convenient access
pub use coordinator::PipelineCoordinator;
pub use decode::{DecodedImage, ImageDecoder};
pub use engine::{InProcessEngine, InstanceHandle, WorkflowEngine, WorkflowInput};
pub use record::MetadataRecorder;
pub use registry::{Claim, Coalesced, InstanceRegistry};
pub use state::{PipelineEvent, PipelineInstance, PipelineState, Stage, StageAttempts};
pub use transform::{destination_key, Transformer};
pub use validate::Validator;
