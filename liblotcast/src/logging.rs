//! Logging setup shared by the lotcast binaries
//!
//! Everything logs through `tracing` to stderr, keeping stdout free
//! for post content and `--format json` output. The output format and
//! level come from `LOTCAST_LOG_FORMAT` and `LOTCAST_LOG_LEVEL`; the
//! `--verbose` flag raises an unset level to debug.
//!
//! ```no_run
//! // warn by default, debug under --verbose, env vars win
//! liblotcast::logging::init_cli(false, "warn");
//! ```

use std::str::FromStr;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain line-per-event text
    Text,
    /// One JSON object per line, for log shippers
    Json,
    /// Multi-line colorized output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Explicit logging setup, for callers that resolve format and level
/// themselves
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: String) -> Self {
        Self { format, level }
    }

    /// Install the global subscriber
    ///
    /// `RUST_LOG` still takes precedence over the configured level.
    /// Panics if a subscriber is already installed, so call it once at
    /// startup.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.level));

        let base = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        match self.format {
            LogFormat::Json => base
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_file(true)
                .with_line_number(true)
                .init(),
            LogFormat::Pretty => base.pretty().with_file(true).with_line_number(true).init(),
            LogFormat::Text => base.with_target(false).init(),
        }
    }
}

/// Standard setup for the binaries
///
/// `default_level` is the binary's quiet baseline (the CLIs use warn,
/// the daemon info); `LOTCAST_LOG_FORMAT` and `LOTCAST_LOG_LEVEL`
/// override everything.
pub fn init_cli(verbose: bool, default_level: &str) {
    LoggingConfig::new(format_from_env(), level_from_env(verbose, default_level)).init();
}

fn format_from_env() -> LogFormat {
    std::env::var("LOTCAST_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text)
}

fn level_from_env(verbose: bool, default_level: &str) -> String {
    match std::env::var("LOTCAST_LOG_LEVEL") {
        Ok(level) => level,
        Err(_) if verbose => "debug".to_string(),
        Err(_) => default_level.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("text".parse::<LogFormat>().unwrap(), LogFormat::Text);
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);

        // Case insensitive
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    }

    #[test]
    fn test_log_format_from_str_invalid() {
        let result = "invalid".parse::<LogFormat>();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid log format: 'invalid'"));
    }

    #[test]
    fn test_log_format_display_round_trip() {
        for format in [LogFormat::Text, LogFormat::Json, LogFormat::Pretty] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_format_env_selects_output() {
        std::env::set_var("LOTCAST_LOG_FORMAT", "json");
        assert_eq!(format_from_env(), LogFormat::Json);
        std::env::set_var("LOTCAST_LOG_FORMAT", "pretty");
        assert_eq!(format_from_env(), LogFormat::Pretty);

        // Unknown or unset values fall back to text
        std::env::set_var("LOTCAST_LOG_FORMAT", "garbage");
        assert_eq!(format_from_env(), LogFormat::Text);
        std::env::remove_var("LOTCAST_LOG_FORMAT");
        assert_eq!(format_from_env(), LogFormat::Text);
    }

    #[test]
    #[serial_test::serial]
    fn test_level_env_overrides_verbose() {
        std::env::remove_var("LOTCAST_LOG_LEVEL");
        assert_eq!(level_from_env(false, "warn"), "warn");
        assert_eq!(level_from_env(true, "warn"), "debug");

        std::env::set_var("LOTCAST_LOG_LEVEL", "trace");
        assert_eq!(level_from_env(false, "warn"), "trace");
        assert_eq!(level_from_env(true, "warn"), "trace");
        std::env::remove_var("LOTCAST_LOG_LEVEL");
    }
}
