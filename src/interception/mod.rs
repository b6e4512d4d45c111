// src/interception/mod.rs
//! Output and file-write interception
//!
//! This module diverts the side effects of an instrumented call into
//! in-memory buffers, scoped to exactly one in-flight call:
//!
//! - **Capture Buffer**: append-only text sinks keyed by logical name
//! - **Interceptor**: buffer ownership and single-scope enforcement
//! - **Context**: the I/O capability an instrumented call writes through
//!
//! # Architecture
//!
//! ```text
//! Instrumented fn (takes &mut CaptureContext)
//!     │
//!     ├─ io.print(..)            → stdout buffer (per call)   | real stdout
//!     ├─ io.create("log.txt")    → file buffer (persistent)   | real file
//!     └─ io.open(.., Read/Append) → real filesystem, always
//!
//! CaptureScope dropped (return, error or panic) → core released
//! ```

pub mod capture_buffer;
pub mod context;
pub mod interceptor;

// Re-export commonly used types
pub use capture_buffer::{split_lines, BufferWriter, CaptureBuffer};
pub use context::{CaptureContext, FileHandle, OpenMode, StdoutHandle};
pub use interceptor::{CaptureScope, InterceptionCore};
