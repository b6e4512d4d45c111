// src/utils/config.rs
//! Watcher configuration
//!
//! Configuration is layered:
//! 1. Defaults (from the `Default` implementation)
//! 2. `labwatch.toml` in the working directory, or an explicit file
//! 3. Environment variables with the `LABWATCH_` prefix
//!    (e.g. `LABWATCH_AUTO_SAVE_LOGS=true`)

use crate::recording::key::KeyScheme;
use crate::utils::errors::{Result, WatchdogError};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "labwatch.toml";

/// Per-instance watcher options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Persist every record to `logs_dir` right after it is stored
    #[serde(default)]
    pub auto_save_logs: bool,

    /// Directory for persisted logs and vaults
    #[serde(default = "default_logs_dir")]
    pub logs_dir: PathBuf,

    /// Disambiguate repeated execution names with a per-name counter
    #[serde(default)]
    pub handle_multiple_calls: bool,

    /// Key derivation used when `handle_multiple_calls` is off
    #[serde(default)]
    pub key_scheme: KeyScheme,

    /// Clear file capture buffers at the start of every capture scope
    #[serde(default)]
    pub reset_file_buffers: bool,

    /// Bot token for completion notifications
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub telegram_token: Option<String>,
}

fn default_logs_dir() -> PathBuf {
    PathBuf::from("exp_runs")
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            auto_save_logs: false,
            logs_dir: default_logs_dir(),
            handle_multiple_calls: false,
            key_scheme: KeyScheme::default(),
            reset_file_buffers: false,
            telegram_token: None,
        }
    }
}

impl WatcherConfig {
    /// Load configuration from `labwatch.toml` (if present) and the environment
    pub fn load() -> Result<Self> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        Self::build(path.exists().then_some(path))
    }

    /// Load configuration from an explicit file, which must exist
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(WatchdogError::ConfigError(format!(
                "config file not found: {}",
                path.display()
            )));
        }
        Self::build(Some(path))
    }

    fn build(path: Option<&Path>) -> Result<Self> {
        let defaults = serde_json::to_string(&Self::default())?;
        let mut builder =
            Config::builder().add_source(File::from_str(&defaults, FileFormat::Json));

        if let Some(path) = path {
            debug!("Loading watcher config from {}", path.display());
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("LABWATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Key scheme in effect once `handle_multiple_calls` is taken into account
    pub fn effective_key_scheme(&self) -> KeyScheme {
        if self.handle_multiple_calls {
            KeyScheme::Counter
        } else {
            self.key_scheme
        }
    }

    pub fn with_auto_save(mut self, logs_dir: impl Into<PathBuf>) -> Self {
        self.auto_save_logs = true;
        self.logs_dir = logs_dir.into();
        self
    }

    pub fn with_multiple_calls(mut self, enabled: bool) -> Self {
        self.handle_multiple_calls = enabled;
        self
    }

    pub fn with_key_scheme(mut self, scheme: KeyScheme) -> Self {
        self.key_scheme = scheme;
        self
    }

    pub fn with_buffer_reset(mut self, enabled: bool) -> Self {
        self.reset_file_buffers = enabled;
        self
    }

    pub fn with_telegram_token(mut self, token: impl Into<String>) -> Self {
        self.telegram_token = Some(token.into());
        self
    }
}
