//! Core data types for the resizeflow pipeline.
//!
//! These types flow between the pipeline stages and out through the
//! reporting interface.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StageError;
use crate::pipeline::state::{PipelineState, Stage, StageAttempts};

/// An object address in blob storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    /// Bucket / container name
    pub container: String,
    /// Object key within the container
    pub key: String,
}

impl Location {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// An uploaded image to run through the pipeline.
///
/// The identity is the object key; it names the metadata record and the
/// per-identity lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageReference {
    source: Location,
    identity: String,
}

impl ImageReference {
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        let source = Location::new(container, key);
        let identity = source.key.clone();
        Self { source, identity }
    }

    pub fn source(&self) -> &Location {
        &self.source
    }

    pub fn container(&self) -> &str {
        &self.source.container
    }

    pub fn key(&self) -> &str {
        &self.source.key
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

/// Target size for the resize stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Dimensions {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Decision of the validation stage. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub reference: ImageReference,
    pub is_valid: bool,
    pub reason: Option<String>,
}

impl ValidationResult {
    pub fn valid(reference: &ImageReference) -> Self {
        Self {
            reference: reference.clone(),
            is_valid: true,
            reason: None,
        }
    }

    pub fn invalid(reference: &ImageReference, reason: impl Into<String>) -> Self {
        Self {
            reference: reference.clone(),
            is_valid: false,
            reason: Some(reason.into()),
        }
    }

    /// The rejection as a stage error, if any.
    pub fn error(&self) -> Option<StageError> {
        if self.is_valid {
            None
        } else {
            Some(StageError::InvalidInput(
                self.reason.clone().unwrap_or_else(|| "rejected".to_string()),
            ))
        }
    }

    pub fn to_payload(&self) -> StagePayload {
        StagePayload {
            bucket: self.reference.container().to_string(),
            key: self.reference.key().to_string(),
            is_valid: Some(self.is_valid),
            error: self.reason.clone(),
        }
    }
}

/// Result of the transform stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutcome {
    pub destination: Location,
    pub success: bool,
    pub error: Option<StageError>,
}

impl TransformOutcome {
    pub fn succeeded(destination: Location) -> Self {
        Self {
            destination,
            success: true,
            error: None,
        }
    }

    pub fn failed(destination: Location, error: StageError) -> Self {
        Self {
            destination,
            success: false,
            error: Some(error),
        }
    }

    pub fn error_detail(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }

    /// Collapse into a `Result` for the retry loop.
    pub fn into_result(self) -> Result<Location, StageError> {
        match self.error {
            None if self.success => Ok(self.destination),
            Some(e) => Err(e),
            None => Err(StageError::TransientIo(
                "transform reported failure without detail".to_string(),
            )),
        }
    }

    pub fn to_payload(&self) -> StagePayload {
        StagePayload {
            bucket: self.destination.container.clone(),
            key: self.destination.key.clone(),
            is_valid: None,
            error: self.error_detail(),
        }
    }
}

/// The inter-stage wire format: `{bucket, key}` plus an explicit error
/// field whenever the producing stage failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StagePayload {
    pub bucket: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub is_valid: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// Processing status stored in the metadata table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageStatus {
    Received,
    Resized,
    Failed,
    Invalid,
}

impl std::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ImageStatus::Received => "Received",
            ImageStatus::Resized => "Resized",
            ImageStatus::Failed => "Failed",
            ImageStatus::Invalid => "Invalid",
        };
        f.write_str(s)
    }
}

/// One row of the metadata table, keyed by image identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataRecord {
    pub image_key: String,
    pub status: ImageStatus,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl MetadataRecord {
    pub fn new(image_key: impl Into<String>, status: ImageStatus) -> Self {
        Self {
            image_key: image_key.into(),
            status,
            timestamp: Some(Utc::now()),
        }
    }
}

/// A failed stage attempt, kept for the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub attempt: u32,
    pub kind: String,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: Stage, attempt: u32, error: &StageError) -> Self {
        Self {
            stage,
            attempt,
            kind: error.kind().to_string(),
            message: error.to_string(),
        }
    }
}

/// The outcome of one pipeline instance, as surfaced to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineReport {
    pub identity: String,
    pub source: Location,
    pub state: PipelineState,
    pub status: ImageStatus,
    /// Set once the transform stage has written its output
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<Location>,
    /// Error detail from whichever stage ended the run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub attempts: StageAttempts,
    /// Every failed attempt, retried or not
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub failures: Vec<StageFailure>,
    /// True when the run stopped on cancellation before a terminal state
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl PipelineReport {
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}
