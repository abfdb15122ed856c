//! Configuration management for resizeflow.
//!
//! Configuration is loaded from the platform config directory with sensible
//! defaults. Every component receives its section at construction.

mod types;
mod validate;

pub use types::*;

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure for resizeflow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stage settings (destination, target size, metadata table)
    pub pipeline: PipelineConfig,

    /// Retry policy
    pub retry: RetryConfig,

    /// Resource limits
    pub limits: LimitsConfig,

    /// Local storage backends
    pub storage: StorageConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// Returns default configuration if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    ///
    /// - macOS: ~/Library/Application Support/com.resizeflow.resizeflow/config.toml
    /// - Linux: ~/.config/resizeflow/config.toml
    ///
    /// Falls back to ~/.resizeflow/config.toml if directory detection fails.
    pub fn default_path() -> PathBuf {
        directories::ProjectDirs::from("com", "resizeflow", "resizeflow")
            .map(|dirs| dirs.config_dir().to_path_buf().join("config.toml"))
            .unwrap_or_else(|| {
                let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
                PathBuf::from(home).join(".resizeflow").join("config.toml")
            })
    }

    /// Resolved blob store root (with ~ expansion).
    pub fn storage_root(&self) -> PathBuf {
        expand(&self.storage.root)
    }

    /// Resolved metadata directory (with ~ expansion).
    pub fn metadata_dir(&self) -> PathBuf {
        expand(&self.storage.metadata_dir)
    }

    /// Serialize the config to a pretty TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

fn expand(path: &Path) -> PathBuf {
    let path_str = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&path_str).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.target_dimensions, Dimensions::new(800, 600));
        assert_eq!(config.pipeline.metadata_table_name, "ImagePipeline-Metadata");
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_config_to_toml() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[pipeline]"));
        assert!(toml.contains("[retry]"));
        assert!(toml.contains("destination_container"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml(
            r#"
            [pipeline]
            destination_container = "thumbs"
            target_dimensions = { width = 320, height = 240 }

            [retry]
            max_attempts = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.pipeline.destination_container, "thumbs");
        assert_eq!(config.pipeline.target_dimensions, Dimensions::new(320, 240));
        assert_eq!(config.pipeline.metadata_table_name, "ImagePipeline-Metadata");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.limits.decode_timeout_ms, 5000);
    }

    #[test]
    fn test_from_toml_validates() {
        let err = Config::from_toml("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }

    #[test]
    fn test_storage_root_expands_tilde() {
        let config = Config::default();
        assert!(!config.storage_root().to_string_lossy().starts_with('~'));
    }
}
