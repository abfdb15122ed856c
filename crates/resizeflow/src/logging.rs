//! Logging initialization.
//!
//! Logs go to stderr; stdout carries reports and config output.

use resizeflow_core::config::LoggingConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber at `level`, pretty or JSON.
///
/// `RUST_LOG` overrides the level when set.
pub fn init(level: &str, json_format: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json_format {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Initialize from the `[logging]` section, with CLI flags taking precedence.
pub fn init_from_config(config: &resizeflow_core::Config, verbose: bool, json_logs: bool) {
    let level = effective_level(&config.logging, verbose);
    let json_format = json_logs || config.logging.format == "json";
    init(level, json_format);
}

/// `--verbose` raises the level to at least debug; unknown levels fall back
/// to info.
fn effective_level(logging: &LoggingConfig, verbose: bool) -> &'static str {
    let configured = match logging.level.to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" => "warn",
        "error" => "error",
        _ => "info",
    };
    match (verbose, configured) {
        (true, "trace") => "trace",
        (true, _) => "debug",
        (false, level) => level,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn logging(level: &str) -> LoggingConfig {
        LoggingConfig {
            level: level.to_string(),
            ..LoggingConfig::default()
        }
    }

    #[test]
    fn test_configured_level_is_used() {
        assert_eq!(effective_level(&logging("warn"), false), "warn");
        assert_eq!(effective_level(&logging("TRACE"), false), "trace");
    }

    #[test]
    fn test_verbose_raises_to_debug() {
        assert_eq!(effective_level(&logging("error"), true), "debug");
        assert_eq!(effective_level(&logging("trace"), true), "trace");
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        assert_eq!(effective_level(&logging("loud"), false), "info");
    }
}
