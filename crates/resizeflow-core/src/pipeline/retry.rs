//! Retry classification and exponential backoff for stage failures.

use crate::config::RetryConfig;
use crate::error::StageError;
use std::time::Duration;

/// Determine whether a stage error is worth retrying.
///
/// Retryable: storage/network unavailability and metadata store outages.
/// Non-retryable: invalid input and decode failures, which are
/// deterministic and would fail the same way again.
pub fn is_retryable(error: &StageError) -> bool {
    match error {
        StageError::TransientIo(_) | StageError::PersistenceFailure(_) => true,
        StageError::InvalidInput(_) | StageError::DecodeFailure(_) => false,
    }
}

/// Calculate exponential backoff duration for a given retry.
///
/// Uses `base_delay * 2^retry`, capped at `max_delay_ms`.
pub fn backoff_duration(retry: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(retry));
    Duration::from_millis(delay.min(max_delay_ms))
}

impl RetryConfig {
    /// Whether a failed `attempt` (1-based) should be followed by another.
    pub fn should_retry(&self, attempt: u32, error: &StageError) -> bool {
        is_retryable(error) && attempt < self.max_attempts
    }

    /// Delay to wait after failed `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        backoff_duration(
            attempt.saturating_sub(1),
            self.base_delay_ms,
            self.max_delay_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_io_is_retryable() {
        let err = StageError::TransientIo("connection reset".to_string());
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_persistence_failure_is_retryable() {
        let err = StageError::PersistenceFailure("table unavailable".to_string());
        assert!(is_retryable(&err));
    }

    #[test]
    fn test_decode_failure_not_retryable() {
        let err = StageError::DecodeFailure("invalid header".to_string());
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_invalid_input_not_retryable() {
        let err = StageError::InvalidInput("Invalid file type".to_string());
        assert!(!is_retryable(&err));
    }

    #[test]
    fn test_backoff_exponential() {
        assert_eq!(backoff_duration(0, 1000, 30_000), Duration::from_millis(1000));
        assert_eq!(backoff_duration(1, 1000, 30_000), Duration::from_millis(2000));
        assert_eq!(backoff_duration(2, 1000, 30_000), Duration::from_millis(4000));
        assert_eq!(backoff_duration(3, 1000, 30_000), Duration::from_millis(8000));
    }

    #[test]
    fn test_backoff_capped() {
        assert_eq!(backoff_duration(10, 1000, 30_000), Duration::from_millis(30_000));
        assert_eq!(backoff_duration(63, u64::MAX, 5_000), Duration::from_millis(5_000));
    }

    #[test]
    fn test_attempt_budget() {
        let config = RetryConfig::default();
        let err = StageError::TransientIo("timeout".to_string());
        assert!(config.should_retry(1, &err));
        assert!(config.should_retry(2, &err));
        assert!(!config.should_retry(3, &err));
    }

    #[test]
    fn test_delay_after_first_attempt_is_base() {
        let config = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 30_000,
        };
        assert_eq!(config.delay_after(1), Duration::from_millis(200));
        assert_eq!(config.delay_after(2), Duration::from_millis(400));
    }
}
