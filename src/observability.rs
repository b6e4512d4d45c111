// src/observability.rs
//! Logging setup
//!
//! Library code only emits `tracing` events; binaries call `init_tracing`
//! once at startup. The filter comes from `RUST_LOG` (default `info`) and
//! `LABWATCH_LOG_FORMAT=json` switches to JSON lines.

use crate::utils::errors::{Result, WatchdogError};
use tracing_subscriber::EnvFilter;

/// Environment variable selecting the log output format
pub const LOG_FORMAT_ENV: &str = "LABWATCH_LOG_FORMAT";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    /// Parse a format name, falling back to `Pretty`
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|n| n.trim().to_ascii_lowercase()) {
            Some(n) if n == "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }

    pub fn from_env() -> Self {
        Self::from_name(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

/// Install the global tracing subscriber
pub fn init_tracing() -> Result<()> {
    init_tracing_with(LogFormat::from_env())
}

pub fn init_tracing_with(format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };

    installed.map_err(|e| WatchdogError::ConfigError(format!("tracing subscriber: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_names() {
        assert_eq!(LogFormat::from_name(Some("json")), LogFormat::Json);
        assert_eq!(LogFormat::from_name(Some(" JSON ")), LogFormat::Json);
        assert_eq!(LogFormat::from_name(Some("text")), LogFormat::Pretty);
        assert_eq!(LogFormat::from_name(None), LogFormat::Pretty);
    }

    #[test]
    fn test_second_init_is_an_error() {
        let _ = init_tracing_with(LogFormat::Pretty);
        assert!(matches!(
            init_tracing_with(LogFormat::Pretty),
            Err(WatchdogError::ConfigError(_))
        ));
    }
}
