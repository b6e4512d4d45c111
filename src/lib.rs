// src/lib.rs
//! labwatch: experiment instrumentation harness
//!
//! Wraps experiment functions so that every call is timed and its inputs,
//! printed output, file writes and return value are kept as a record.
//!
//! # Architecture
//!
//! - **interception**: capture buffers, scope enforcement, the I/O context
//! - **recording**: the `Watcher`, execution keys, records, vaults, storage
//! - **notify**: best-effort "call finished" notifications
//! - **observability**: tracing subscriber setup
//! - **utils**: configuration and error types
//!
//! # Example
//!
//! ```no_run
//! use labwatch::{LogOptions, Watcher, WatcherConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let watcher = Watcher::new(WatcherConfig::default().with_multiple_calls(true))?;
//! let mut train = watcher.wrap(
//!     |io: &mut labwatch::CaptureContext<'_>, epochs: u32| -> anyhow::Result<f64> {
//!         io.print(format!("training for {} epochs", epochs));
//!         Ok(0.93)
//!     },
//!     LogOptions::new("train").collect_output(true),
//! );
//!
//! train.call(10)?;
//! let record = watcher.record("train_0").expect("recorded");
//! assert_eq!(record.return_value, "0.93");
//! # Ok(())
//! # }
//! ```

pub mod interception;
pub mod notify;
pub mod observability;
pub mod recording;
pub mod utils;

// Re-export commonly used types
pub use interception::{CaptureContext, InterceptionCore, OpenMode};
pub use notify::{Notifier, NotifyError};
pub use recording::{CallRecord, ExecutionKey, Instrumented, KeyScheme, LogOptions, Vault, Watcher};
pub use utils::config::WatcherConfig;
pub use utils::errors::{Result, WatchdogError};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const GIT_HASH: &str = env!("GIT_HASH");

/// Build information
pub struct BuildInfo {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub build_timestamp: &'static str,
    pub rustc_version: &'static str,
}

impl BuildInfo {
    pub fn current() -> Self {
        Self {
            version: VERSION,
            git_hash: GIT_HASH,
            build_timestamp: env!("BUILD_TIMESTAMP"),
            rustc_version: env!("RUSTC_VERSION"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_build_info() {
        let info = BuildInfo::current();
        assert_eq!(info.version, VERSION);
        assert!(!info.git_hash.is_empty());
    }
}
