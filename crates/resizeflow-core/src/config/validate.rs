//! Configuration validation with range checks.

use crate::error::ConfigError;

use super::Config;

impl Config {
    /// Validate configuration values are within acceptable ranges.
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.destination_container.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "pipeline.destination_container must not be empty".into(),
            ));
        }
        if self.pipeline.metadata_table_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "pipeline.metadata_table_name must not be empty".into(),
            ));
        }
        let dims = self.pipeline.target_dimensions;
        if dims.width == 0 || dims.height == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.target_dimensions must be > 0 in both axes".into(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be > 0".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(ConfigError::ValidationError(
                "retry.base_delay_ms must be <= retry.max_delay_ms".into(),
            ));
        }
        if self.limits.max_file_size_mb == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_file_size_mb must be > 0".into(),
            ));
        }
        if self.limits.max_image_dimension == 0 {
            return Err(ConfigError::ValidationError(
                "limits.max_image_dimension must be > 0".into(),
            ));
        }
        if self.limits.decode_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.decode_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.instance_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.instance_timeout_ms must be > 0".into(),
            ));
        }
        if self.limits.status_write_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "limits.status_write_timeout_ms must be > 0".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_passes_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_destination() {
        let mut config = Config::default();
        config.pipeline.destination_container = " ".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("destination_container"));
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let mut config = Config::default();
        config.pipeline.target_dimensions.height = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("target_dimensions"));
    }

    #[test]
    fn test_validate_rejects_inverted_delays() {
        let mut config = Config::default();
        config.retry.base_delay_ms = 60_000;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("base_delay_ms"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = Config::default();
        config.limits.instance_timeout_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("instance_timeout_ms"));
    }
}
