//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::types::Dimensions;

/// Pipeline settings passed to the stages at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Container that receives resized images
    pub destination_container: String,

    /// Metadata table the recorder writes to
    pub metadata_table_name: String,

    /// Exact output size (stretched, not cropped)
    pub target_dimensions: Dimensions,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            destination_container: "resized-images".to_string(),
            metadata_table_name: "ImagePipeline-Metadata".to_string(),
            target_dimensions: Dimensions::default(),
        }
    }
}

/// Retry policy for the transform and metadata stages.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per stage, including the first
    pub max_attempts: u32,

    /// Delay before the first retry in milliseconds; doubles each retry
    pub base_delay_ms: u64,

    /// Upper bound for a single backoff delay
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 30_000,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum source object size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,

    /// Decode + resize timeout in milliseconds
    pub decode_timeout_ms: u64,

    /// Maximum lifetime of one pipeline instance in milliseconds
    pub instance_timeout_ms: u64,

    /// Bound on the status write that follows an Invalid or Failed outcome
    pub status_write_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 10000,
            decode_timeout_ms: 5000,
            instance_timeout_ms: 300_000,
            status_write_timeout_ms: 1000,
        }
    }
}

/// Local backends used by the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the local blob store; containers are subdirectories
    pub root: PathBuf,

    /// Directory holding metadata table files
    pub metadata_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("~/.resizeflow/storage"),
            metadata_dir: PathBuf::from("~/.resizeflow/metadata"),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
