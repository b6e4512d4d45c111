// src/interception/capture_buffer.rs
//! In-memory capture buffers
//!
//! A `CaptureBuffer` is an append-only text sink shared between the
//! interception core (which owns it for the lifetime of the core) and any
//! writers handed out to an instrumented call.

use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Append-only text sink addressed by a logical resource name
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    inner: Arc<Mutex<String>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text to the buffer
    pub fn append(&self, text: &str) {
        self.inner.lock().push_str(text);
    }

    /// Copy of everything written so far
    pub fn contents(&self) -> String {
        self.inner.lock().clone()
    }

    /// Captured text split into lines
    pub fn lines(&self) -> Vec<String> {
        split_lines(&self.inner.lock())
    }

    /// Captured text split into lines with surrounding whitespace removed
    pub fn stripped_lines(&self) -> Vec<String> {
        split_lines(&self.inner.lock())
            .into_iter()
            .map(|line| line.trim().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Writer appending into this buffer
    pub fn writer(&self) -> BufferWriter {
        BufferWriter {
            buffer: self.clone(),
            pending: Vec::new(),
        }
    }
}

/// `io::Write` adapter over a `CaptureBuffer`
///
/// Bytes are decoded as UTF-8. An incomplete multi-byte sequence at the end
/// of a write is held back until the rest arrives.
#[derive(Debug)]
pub struct BufferWriter {
    buffer: CaptureBuffer,
    pending: Vec<u8>,
}

impl BufferWriter {
    pub fn buffer(&self) -> &CaptureBuffer {
        &self.buffer
    }
}

impl Write for BufferWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        let mut text = String::new();
        let mut consumed = 0;

        loop {
            match std::str::from_utf8(&self.pending[consumed..]) {
                Ok(rest) => {
                    text.push_str(rest);
                    consumed = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid = consumed + e.valid_up_to();
                    text.push_str(&String::from_utf8_lossy(&self.pending[consumed..valid]));
                    match e.error_len() {
                        // Incomplete tail: hold it back for the next write.
                        None => {
                            consumed = valid;
                            break;
                        }
                        Some(len) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            consumed = valid + len;
                        }
                    }
                }
            }
        }

        self.pending.drain(..consumed);
        self.buffer.append(&text);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if !self.pending.is_empty() {
            let text = String::from_utf8_lossy(&self.pending).into_owned();
            self.buffer.append(&text);
            self.pending.clear();
        }
        Ok(())
    }
}

impl Drop for BufferWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// Split text on line terminators without a trailing empty line
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}
