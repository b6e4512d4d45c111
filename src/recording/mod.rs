// src/recording/mod.rs
//! Call recording and storage
//!
//! - **Recorder**: `Watcher`, wraps functions and stores one record per call
//! - **Key**: execution key derivation (plain, timestamp, counter)
//! - **Record**: the `CallRecord` and its text codecs
//! - **Vault**: named objects stashed by an instrumented call
//! - **Storage**: one JSON file per execution key
//! - **Exporter**: JSON and text rendering for the CLI
//!
//! # Architecture
//!
//! ```text
//! Instrumented::call(args)
//!        ↓
//! begin scope → f(&mut CaptureContext, args) → end scope
//!        ↓
//! CallRecord → ExecutionKey → log store → <logs_dir>/<key>.json
//!                                  ↓
//!                              notifier
//! ```

pub mod exporter;
pub mod key;
pub mod record;
pub mod recorder;
pub mod storage;
pub mod vault;

pub use exporter::{ExportFormat, Exporter};
pub use key::{ExecutionKey, KeyGenerator, KeyScheme};
pub use record::CallRecord;
pub use recorder::{Instrumented, LogOptions, RecorderStats, Watcher};
pub use storage::{RecordStorage, StorageConfig, StorageStats};
pub use vault::Vault;
