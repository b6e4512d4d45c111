// src/interception/interceptor.rs
//! Interception core
//!
//! Owns the logical-name → `CaptureBuffer` map and hands out at most one
//! `CaptureScope` at a time. Redirection is bound to the `CaptureContext`
//! obtained from the scope, so nothing process-wide is ever swapped: ending
//! the scope (explicitly or by dropping it during an error return or a panic)
//! is all it takes to restore normal behaviour. File and stdout handles
//! borrow the scope they came from, so none of them outlive it.

use crate::interception::capture_buffer::CaptureBuffer;
use crate::interception::context::CaptureContext;
use crate::recording::vault::Vault;
use crate::utils::errors::{Result, WatchdogError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use tracing::debug;

/// Label used for scopes opened without an explicit call name
const ANONYMOUS_SCOPE: &str = "<anonymous>";

/// Interception core shared by every call of one watcher
#[derive(Debug, Default)]
pub struct InterceptionCore {
    /// Persistent file buffers, keyed by logical name
    file_buffers: Mutex<BTreeMap<String, CaptureBuffer>>,

    /// Label of the currently active scope
    active: Mutex<Option<String>>,
}

impl InterceptionCore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a capture scope
    ///
    /// Fails with `WatchdogError::Reentrancy` if a scope is already active.
    pub fn begin_capture(
        &self,
        capture_stdout: bool,
        capture_files: bool,
    ) -> Result<CaptureScope<'_>> {
        self.begin_labeled(ANONYMOUS_SCOPE, capture_stdout, capture_files)
    }

    /// Begin a capture scope labeled with the instrumented call's name
    pub fn begin_labeled(
        &self,
        label: &str,
        capture_stdout: bool,
        capture_files: bool,
    ) -> Result<CaptureScope<'_>> {
        {
            let mut active = self.active.lock();
            if let Some(current) = active.as_ref() {
                return Err(WatchdogError::Reentrancy {
                    active: current.clone(),
                });
            }
            *active = Some(label.to_string());
        }

        debug!(
            "Capture scope '{}' started (stdout: {}, files: {})",
            label, capture_stdout, capture_files
        );

        Ok(CaptureScope {
            core: self,
            label: label.to_string(),
            stdout: capture_stdout.then(CaptureBuffer::new),
            capture_files,
            released: false,
        })
    }

    /// End a capture scope, returning its captured stdout lines
    ///
    /// Dropping the scope has the same restoring effect; this form exists
    /// so the stdout lines can be read back in the same step.
    pub fn end_capture(&self, scope: CaptureScope<'_>) -> Vec<String> {
        scope.end()
    }

    /// Captured stdout lines of an active scope
    pub fn read_stdout(&self, scope: &CaptureScope<'_>) -> Vec<String> {
        scope.read_stdout()
    }

    /// Stripped, line-split contents of every file buffer populated so far
    pub fn read_files(&self) -> BTreeMap<String, Vec<String>> {
        self.file_buffers
            .lock()
            .iter()
            .map(|(name, buffer)| (name.clone(), buffer.stripped_lines()))
            .collect()
    }

    /// Buffer for a logical name, created on first use
    pub fn file_buffer(&self, name: &str) -> CaptureBuffer {
        self.file_buffers
            .lock()
            .entry(name.to_string())
            .or_default()
            .clone()
    }

    /// Logical names with a buffer
    pub fn buffer_names(&self) -> Vec<String> {
        self.file_buffers.lock().keys().cloned().collect()
    }

    /// Whether a scope is currently active
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Drop every file buffer
    pub fn reset(&self) -> Result<()> {
        if let Some(current) = self.active.lock().as_ref() {
            return Err(WatchdogError::Reentrancy {
                active: current.clone(),
            });
        }
        self.clear_buffers();
        Ok(())
    }

    pub(crate) fn clear_buffers(&self) {
        let mut buffers = self.file_buffers.lock();
        debug!("Clearing {} file buffers", buffers.len());
        buffers.clear();
    }

    fn release(&self, label: &str) {
        *self.active.lock() = None;
        debug!("Capture scope '{}' ended", label);
    }
}

/// An active capture scope
///
/// Releases the core when dropped, whatever the exit path.
#[derive(Debug)]
pub struct CaptureScope<'a> {
    core: &'a InterceptionCore,
    label: String,
    stdout: Option<CaptureBuffer>,
    capture_files: bool,
    released: bool,
}

impl<'a> CaptureScope<'a> {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn captures_stdout(&self) -> bool {
        self.stdout.is_some()
    }

    pub fn captures_files(&self) -> bool {
        self.capture_files
    }

    /// I/O capability for the instrumented call
    pub fn context<'s>(&'s self, vault: &'s mut Vault) -> CaptureContext<'s> {
        CaptureContext::new(
            self.stdout.clone(),
            self.capture_files.then_some(self.core),
            vault,
        )
    }

    /// Captured stdout split into lines (empty when stdout is not captured)
    pub fn read_stdout(&self) -> Vec<String> {
        self.stdout
            .as_ref()
            .map(CaptureBuffer::lines)
            .unwrap_or_default()
    }

    /// End the scope, returning its captured stdout lines
    pub fn end(mut self) -> Vec<String> {
        let lines = self.read_stdout();
        self.release();
        lines
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.core.release(&self.label);
        }
    }
}

impl Drop for CaptureScope<'_> {
    fn drop(&mut self) {
        self.release();
    }
}
