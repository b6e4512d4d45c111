// src/interception/context.rs
//! I/O capability handed to instrumented calls
//!
//! Instrumented functions write output and open files through a
//! `CaptureContext` instead of the process-wide primitives. Depending on
//! the scope it was created from, the context either diverts those writes
//! into capture buffers or passes them straight through:
//!
//! - `print` / `stdout()` → per-call stdout buffer, or the real stdout
//! - `open(.., OpenMode::Write)` → persistent file buffer, or the real file
//! - every other open mode → always the real filesystem
//!
//! Handles borrow the scope they were opened in, so a captured writer
//! cannot outlive its scope:
//!
//! ```compile_fail
//! use labwatch::{LogOptions, Watcher, WatcherConfig};
//!
//! let watcher = Watcher::new(WatcherConfig::default()).unwrap();
//! let mut kept = None;
//! watcher
//!     .log(&LogOptions::new("kept").collect_files(true), (), |io, ()| -> anyhow::Result<()> {
//!         kept = Some(io.create("out.txt")?);
//!         Ok(())
//!     })
//!     .unwrap();
//! ```
//!
//! ```compile_fail
//! use labwatch::{LogOptions, Watcher, WatcherConfig};
//!
//! let watcher = Watcher::new(WatcherConfig::default()).unwrap();
//! let out = watcher
//!     .log(&LogOptions::new("returned").collect_output(true), (), |io, ()| -> anyhow::Result<_> {
//!         Ok(io.stdout())
//!     })
//!     .unwrap();
//! ```

use crate::interception::capture_buffer::{BufferWriter, CaptureBuffer};
use crate::interception::interceptor::InterceptionCore;
use crate::recording::vault::Vault;
use std::fs::{File, OpenOptions};
use std::fmt;
use std::io::{self, Read, Write};
use std::marker::PhantomData;
use std::path::Path;
use tracing::trace;

/// File open modes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Open an existing file for reading
    Read,

    /// Create or truncate a file for writing (captured when file capture is on)
    Write,

    /// Append to a file, creating it if needed
    Append,

    /// Open for reading and writing, creating it if needed
    ReadWrite,
}

/// I/O capability bound to one capture scope
pub struct CaptureContext<'a> {
    stdout: Option<CaptureBuffer>,
    files: Option<&'a InterceptionCore>,
    vault: &'a mut Vault,
}

impl<'a> CaptureContext<'a> {
    pub(crate) fn new(
        stdout: Option<CaptureBuffer>,
        files: Option<&'a InterceptionCore>,
        vault: &'a mut Vault,
    ) -> Self {
        Self {
            stdout,
            files,
            vault,
        }
    }

    /// Write one line to standard output
    pub fn print(&mut self, text: impl AsRef<str>) {
        self.write_line(text.as_ref());
    }

    /// Write one line to standard output
    pub fn write_line(&mut self, text: &str) {
        match &self.stdout {
            Some(buffer) => {
                buffer.append(text);
                buffer.append("\n");
            }
            None => {
                let mut out = io::stdout().lock();
                if let Err(e) = writeln!(out, "{}", text) {
                    trace!("Dropped stdout line: {}", e);
                }
            }
        }
    }

    /// Writer for the standard output channel
    pub fn stdout(&self) -> StdoutHandle<'a> {
        let sink = match &self.stdout {
            Some(buffer) => StdoutSink::Captured(buffer.writer()),
            None => StdoutSink::Real(io::stdout()),
        };
        StdoutHandle {
            sink,
            _scope: PhantomData,
        }
    }

    /// Open a file
    ///
    /// Only `OpenMode::Write` is redirected, and only when the scope captures
    /// files. The path is then used as the logical buffer name and the real
    /// filesystem is never touched.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> io::Result<FileHandle<'a>> {
        let path = path.as_ref();

        if let (OpenMode::Write, Some(core)) = (mode, self.files) {
            let name = path.to_string_lossy();
            trace!("Redirecting write to '{}' into capture buffer", name);
            return Ok(FileHandle::new(FileSink::Captured(
                core.file_buffer(&name).writer(),
            )));
        }

        let file = match mode {
            OpenMode::Read => File::open(path)?,
            OpenMode::Write => File::create(path)?,
            OpenMode::Append => OpenOptions::new().append(true).create(true).open(path)?,
            OpenMode::ReadWrite => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?,
        };
        Ok(FileHandle::new(FileSink::Real(file)))
    }

    /// Shorthand for `open(path, OpenMode::Write)`
    pub fn create(&mut self, path: impl AsRef<Path>) -> io::Result<FileHandle<'a>> {
        self.open(path, OpenMode::Write)
    }

    /// Whether standard output is being captured
    pub fn captures_stdout(&self) -> bool {
        self.stdout.is_some()
    }

    /// Whether file writes are being captured
    pub fn captures_files(&self) -> bool {
        self.files.is_some()
    }

    /// Object vault of the current call
    pub fn vault(&mut self) -> &mut Vault {
        &mut *self.vault
    }
}

/// Standard output writer, valid for the scope it was taken in
pub struct StdoutHandle<'a> {
    sink: StdoutSink,
    _scope: PhantomData<&'a InterceptionCore>,
}

enum StdoutSink {
    Captured(BufferWriter),
    Real(io::Stdout),
}

impl StdoutHandle<'_> {
    pub fn is_captured(&self) -> bool {
        matches!(self.sink, StdoutSink::Captured(_))
    }
}

impl fmt::Debug for StdoutHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdoutHandle")
            .field("captured", &self.is_captured())
            .finish()
    }
}

impl Write for StdoutHandle<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            StdoutSink::Captured(w) => w.write(buf),
            StdoutSink::Real(out) => out.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            StdoutSink::Captured(w) => w.flush(),
            StdoutSink::Real(out) => out.flush(),
        }
    }
}

/// File handle returned by `CaptureContext::open`, valid for the scope it
/// was opened in
pub struct FileHandle<'a> {
    sink: FileSink,
    _scope: PhantomData<&'a InterceptionCore>,
}

#[derive(Debug)]
enum FileSink {
    /// Writes go into a capture buffer
    Captured(BufferWriter),

    /// A real file on disk
    Real(File),
}

impl FileHandle<'_> {
    fn new(sink: FileSink) -> Self {
        Self {
            sink,
            _scope: PhantomData,
        }
    }

    pub fn is_captured(&self) -> bool {
        matches!(self.sink, FileSink::Captured(_))
    }
}

impl fmt::Debug for FileHandle<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("FileHandle").field(&self.sink).finish()
    }
}

impl Write for FileHandle<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            FileSink::Captured(w) => w.write(buf),
            FileSink::Real(f) => f.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            FileSink::Captured(w) => w.flush(),
            FileSink::Real(f) => f.flush(),
        }
    }
}

impl Read for FileHandle<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match &mut self.sink {
            FileSink::Captured(_) => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "captured file handles are write-only",
            )),
            FileSink::Real(f) => f.read(buf),
        }
    }
}
