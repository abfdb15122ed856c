//! Error types for the resizeflow pipeline.
//!
//! Low-level errors carry the context of where they happened (object key,
//! stage, limits). Each of them folds into a [`StageError`], the four-kind
//! taxonomy the coordinator uses to decide between retrying and giving up.

use thiserror::Error;

use crate::metadata::MetadataStoreError;
use crate::storage::StorageError;

/// Top-level error type for resizeflow operations.
#[derive(Error, Debug)]
pub enum ResizeflowError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// Workflow engine errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Notification handling errors
    #[error("Trigger error: {0}")]
    Trigger(#[from] TriggerError),

    /// Metadata store errors outside of a pipeline run
    #[error("Metadata store error: {0}")]
    MetadataStore(#[from] MetadataStoreError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Detailed pipeline errors, organized by what went wrong.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Image decoding failed
    #[error("Decode error for {key}: {message}")]
    Decode { key: String, message: String },

    /// Re-encoding the resized image failed
    #[error("Encode error for {key}: {message}")]
    Encode { key: String, message: String },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {key} after {timeout_ms}ms")]
    Timeout {
        key: String,
        stage: String,
        timeout_ms: u64,
    },

    /// Object exceeds size limit
    #[error("File too large: {key} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge { key: String, size_mb: u64, max_mb: u64 },

    /// Image dimensions exceed limit
    #[error("Image too large: {key} ({width}x{height} > {max_dim})")]
    ImageTooLarge {
        key: String,
        width: u32,
        height: u32,
        max_dim: u32,
    },

    /// Unsupported image format
    #[error("Unsupported format for {key}: {format}")]
    UnsupportedFormat { key: String, format: String },

    /// Blob storage failure
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Metadata store failure
    #[error("Metadata store error: {0}")]
    MetadataStore(#[from] MetadataStoreError),
}

/// The failure taxonomy every stage reports to the coordinator.
///
/// Only `TransientIo` and `PersistenceFailure` are retried; see
/// [`crate::pipeline::retry::is_retryable`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StageError {
    /// Bad extension or malformed reference. Short-circuits to `Invalid`.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Storage or network unavailable.
    #[error("Transient I/O failure: {0}")]
    TransientIo(String),

    /// Corrupt or unsupported image data.
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// Metadata store unavailable.
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
}

impl StageError {
    /// Short kind name used in logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            StageError::InvalidInput(_) => "invalid_input",
            StageError::TransientIo(_) => "transient_io",
            StageError::DecodeFailure(_) => "decode_failure",
            StageError::PersistenceFailure(_) => "persistence_failure",
        }
    }
}

impl From<PipelineError> for StageError {
    fn from(err: PipelineError) -> Self {
        let message = err.to_string();
        match err {
            PipelineError::Decode { .. }
            | PipelineError::Encode { .. }
            | PipelineError::Timeout { .. }
            | PipelineError::FileTooLarge { .. }
            | PipelineError::ImageTooLarge { .. }
            | PipelineError::UnsupportedFormat { .. } => StageError::DecodeFailure(message),
            PipelineError::Storage(StorageError::InvalidKey(_)) => {
                StageError::InvalidInput(message)
            }
            PipelineError::Storage(_) => StageError::TransientIo(message),
            PipelineError::MetadataStore(_) => StageError::PersistenceFailure(message),
        }
    }
}

impl From<StorageError> for StageError {
    fn from(err: StorageError) -> Self {
        PipelineError::from(err).into()
    }
}

impl From<MetadataStoreError> for StageError {
    fn from(err: MetadataStoreError) -> Self {
        PipelineError::from(err).into()
    }
}

/// A state machine transition that is not part of the pipeline topology.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid transition: {event} is not allowed in state {from}")]
pub struct TransitionError {
    pub from: &'static str,
    pub event: &'static str,
}

/// Workflow engine errors.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine is shutting down and no longer accepts instances
    #[error("Engine is shut down")]
    ShutDown,
}

/// Notification handling errors.
#[derive(Error, Debug)]
pub enum TriggerError {
    /// The notification payload is not a valid envelope
    #[error("Malformed notification: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Convenience type alias for resizeflow results.
pub type Result<T> = std::result::Result<T, ResizeflowError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_maps_to_decode_failure() {
        let err = PipelineError::Decode {
            key: "broken.png".to_string(),
            message: "invalid header".to_string(),
        };
        let stage: StageError = err.into();
        assert!(matches!(stage, StageError::DecodeFailure(_)));
        assert!(stage.to_string().contains("broken.png"));
    }

    #[test]
    fn test_storage_not_found_maps_to_transient_io() {
        let stage: StageError = StorageError::NotFound("in/cat.jpg".to_string()).into();
        assert_eq!(stage.kind(), "transient_io");
    }

    #[test]
    fn test_invalid_storage_key_maps_to_invalid_input() {
        let stage: StageError = StorageError::InvalidKey("../etc".to_string()).into();
        assert!(matches!(stage, StageError::InvalidInput(_)));
    }

    #[test]
    fn test_metadata_error_maps_to_persistence_failure() {
        let stage: StageError = MetadataStoreError::Unavailable("down".to_string()).into();
        assert!(matches!(stage, StageError::PersistenceFailure(_)));
    }
}
