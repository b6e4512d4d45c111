// src/recording/recorder.rs
//! Call recorder
//!
//! A `Watcher` wraps experiment functions so that every successful call
//! leaves a `CallRecord` behind: timings, rendered arguments, captured
//! stdout and file writes, and the rendered return value.
//!
//! Instrumented functions receive a `CaptureContext` as their first
//! argument and write through it. A failing call (an `Err` or a panic)
//! still releases the capture scope before the failure leaves the
//! wrapper, and leaves no record behind.

use crate::interception::{CaptureContext, InterceptionCore};
use crate::notify::{self, completion_message, Notifier};
use crate::recording::key::{ExecutionKey, KeyGenerator};
use crate::recording::record::{now_micros, render_args, render_value, CallRecord};
use crate::recording::storage::{RecordStorage, StorageConfig};
use crate::recording::vault::Vault;
use crate::utils::config::WatcherConfig;
use crate::utils::errors::{Result, WatchdogError};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-call logging options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOptions {
    /// Logical name the execution key is derived from
    pub execution_name: String,

    /// Capture everything printed through the context
    pub collect_output: bool,

    /// Capture everything written to files opened for writing
    pub collect_files: bool,

    /// Recipient to notify when the call finishes
    pub notify: Option<String>,
}

impl LogOptions {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            execution_name: name.into(),
            collect_output: false,
            collect_files: false,
            notify: None,
        }
    }

    pub fn collect_output(mut self, enabled: bool) -> Self {
        self.collect_output = enabled;
        self
    }

    pub fn collect_files(mut self, enabled: bool) -> Self {
        self.collect_files = enabled;
        self
    }

    pub fn notify(mut self, recipient: impl Into<String>) -> Self {
        self.notify = Some(recipient.into());
        self
    }
}

/// Recorder statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecorderStats {
    pub calls_recorded: u64,
    pub calls_failed: u64,
    pub records_persisted: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
}

struct WatcherInner {
    config: WatcherConfig,
    core: InterceptionCore,
    keys: Mutex<KeyGenerator>,
    logs: Mutex<BTreeMap<ExecutionKey, CallRecord>>,
    vaults: Mutex<BTreeMap<ExecutionKey, Vault>>,
    last_key: Mutex<Option<ExecutionKey>>,
    storage: Option<RecordStorage>,
    notifier: Option<Arc<dyn Notifier>>,
    stats: Mutex<RecorderStats>,
}

/// Records instrumented experiment calls
///
/// Cloning is cheap; clones share the same core and stores.
#[derive(Clone)]
pub struct Watcher {
    inner: Arc<WatcherInner>,
}

impl Debug for Watcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watcher")
            .field("config", &self.inner.config)
            .field("records", &self.inner.logs.lock().len())
            .field("notifier", &self.inner.notifier.is_some())
            .finish()
    }
}

impl Watcher {
    /// Create a watcher
    ///
    /// Creates the logs directory when auto-save is on and connects the
    /// notifier when a token is configured; both failures are fatal.
    pub fn new(config: WatcherConfig) -> Result<Self> {
        let notifier = match config.telegram_token.as_deref() {
            Some(token) => Some(notify::connect(token)?),
            None => None,
        };
        Self::build(config, notifier)
    }

    /// Create a watcher with an explicit notifier, ignoring `telegram_token`
    pub fn with_notifier(config: WatcherConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        Self::build(config, Some(notifier))
    }

    fn build(config: WatcherConfig, notifier: Option<Arc<dyn Notifier>>) -> Result<Self> {
        let storage = if config.auto_save_logs {
            Some(RecordStorage::new(StorageConfig {
                base_dir: config.logs_dir.clone(),
            })?)
        } else {
            None
        };

        info!(
            "Watcher created (keys: {:?}, auto-save: {})",
            config.effective_key_scheme(),
            config.auto_save_logs
        );

        Ok(Self {
            inner: Arc::new(WatcherInner {
                keys: Mutex::new(KeyGenerator::new(config.effective_key_scheme())),
                config,
                core: InterceptionCore::new(),
                logs: Mutex::new(BTreeMap::new()),
                vaults: Mutex::new(BTreeMap::new()),
                last_key: Mutex::new(None),
                storage,
                notifier,
                stats: Mutex::new(RecorderStats::default()),
            }),
        })
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.inner.config
    }

    /// The interception core shared by this watcher's calls
    pub fn core(&self) -> &InterceptionCore {
        &self.inner.core
    }

    /// Wrap a function; every `call` of the result is recorded
    pub fn wrap<A, T, E, F>(&self, func: F, options: LogOptions) -> Instrumented<F, A, T, E>
    where
        A: Debug,
        T: Debug,
        E: From<WatchdogError>,
        F: FnMut(&mut CaptureContext<'_>, A) -> std::result::Result<T, E>,
    {
        Instrumented {
            watcher: self.clone(),
            options,
            func,
            last_key: None,
            _signature: PhantomData,
        }
    }

    /// Run and record a single call
    pub fn log<A, T, E, F>(&self, options: &LogOptions, args: A, mut func: F) -> std::result::Result<T, E>
    where
        A: Debug,
        T: Debug,
        E: From<WatchdogError>,
        F: FnMut(&mut CaptureContext<'_>, A) -> std::result::Result<T, E>,
    {
        self.run(options, &mut func, args).map(|(value, _)| value)
    }

    fn run<A, T, E, F>(
        &self,
        options: &LogOptions,
        func: &mut F,
        args: A,
    ) -> std::result::Result<(T, ExecutionKey), E>
    where
        A: Debug,
        T: Debug,
        E: From<WatchdogError>,
        F: FnMut(&mut CaptureContext<'_>, A) -> std::result::Result<T, E>,
    {
        let inner = &*self.inner;

        if options.notify.is_some() && inner.notifier.is_none() {
            let name = options.execution_name.clone();
            return Err(WatchdogError::MissingNotifierCredential(name).into());
        }

        let scope = inner.core.begin_labeled(
            &options.execution_name,
            options.collect_output,
            options.collect_files,
        )?;
        if inner.config.reset_file_buffers {
            inner.core.clear_buffers();
        }

        let input_values = render_args(&args);
        let mut vault = Vault::new();

        let start_time = now_micros();
        let unwinding = FailureGuard::armed(&inner.stats);
        let outcome = {
            let mut io = scope.context(&mut vault);
            func(&mut io, args)
        };
        unwinding.disarm();
        let end_time = now_micros();

        // Release before anything else can fail.
        let prints = scope.end();

        let value = match outcome {
            Ok(value) => value,
            Err(e) => {
                debug!("Call '{}' failed, no record stored", options.execution_name);
                inner.stats.lock().calls_failed += 1;
                return Err(e);
            }
        };

        let files = options.collect_files.then(|| inner.core.read_files());
        let record = CallRecord::new(
            start_time,
            end_time,
            input_values,
            options.collect_output.then_some(prints),
            files,
            render_value(&value),
        );

        let key = inner.keys.lock().next(&options.execution_name, &start_time);
        debug!(
            "Recorded '{}' as {} in {}",
            options.execution_name,
            key,
            record.elapsed_text()
        );

        inner.logs.lock().insert(key.clone(), record.clone());
        if !vault.is_empty() {
            inner.vaults.lock().insert(key.clone(), vault.clone());
        }
        *inner.last_key.lock() = Some(key.clone());
        inner.stats.lock().calls_recorded += 1;

        if let Some(storage) = &inner.storage {
            storage.write_record(&key, &record)?;
            if !vault.is_empty() {
                storage.write_vault(&key, &vault)?;
            }
            inner.stats.lock().records_persisted += 1;
        }

        if let Some(recipient) = &options.notify {
            self.notify(recipient, &options.execution_name, &record);
        }

        Ok((value, key))
    }

    fn notify(&self, recipient: &str, name: &str, record: &CallRecord) {
        let Some(notifier) = &self.inner.notifier else {
            return;
        };

        let text = completion_message(name, &record.end_time, &record.elapsed);
        match notifier.send(recipient, &text) {
            Ok(()) => {
                debug!("Notified {} that '{}' finished", recipient, name);
                self.inner.stats.lock().notifications_sent += 1;
            }
            Err(e) => {
                warn!("Notification for '{}' not delivered: {}", name, e);
                self.inner.stats.lock().notifications_failed += 1;
            }
        }
    }

    /// Snapshot of every stored record
    pub fn logs(&self) -> BTreeMap<ExecutionKey, CallRecord> {
        self.inner.logs.lock().clone()
    }

    /// Record stored under `key`
    pub fn record(&self, key: &str) -> Option<CallRecord> {
        self.inner.logs.lock().get(&ExecutionKey::new(key)).cloned()
    }

    /// Stored execution keys, sorted
    pub fn keys(&self) -> Vec<ExecutionKey> {
        self.inner.logs.lock().keys().cloned().collect()
    }

    /// Key of the most recent recorded call
    pub fn last_key(&self) -> Option<ExecutionKey> {
        self.inner.last_key.lock().clone()
    }

    /// Snapshot of every stored vault
    pub fn vaults(&self) -> BTreeMap<ExecutionKey, Vault> {
        self.inner.vaults.lock().clone()
    }

    /// Vault stored under `key`
    pub fn vault(&self, key: &str) -> Option<Vault> {
        self.inner.vaults.lock().get(&ExecutionKey::new(key)).cloned()
    }

    /// Write every stored record to `dir`
    pub fn save_logs(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let storage = RecordStorage::open(StorageConfig {
            base_dir: dir.as_ref().to_path_buf(),
        });
        let logs = self.logs();
        for (key, record) in &logs {
            storage.write_record(key, record)?;
        }
        info!("Saved {} records to {:?}", logs.len(), storage.base_dir());
        Ok(logs.len())
    }

    /// Write every stored vault to `dir`
    pub fn save_vaults(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let storage = RecordStorage::open(StorageConfig {
            base_dir: dir.as_ref().to_path_buf(),
        });
        let vaults = self.vaults();
        for (key, vault) in &vaults {
            storage.write_vault(key, vault)?;
        }
        info!("Saved {} vaults to {:?}", vaults.len(), storage.base_dir());
        Ok(vaults.len())
    }

    /// Drop all records, vaults, counters and file buffers
    pub fn clear(&self) -> Result<()> {
        self.inner.core.reset()?;
        self.inner.logs.lock().clear();
        self.inner.vaults.lock().clear();
        self.inner.keys.lock().reset();
        *self.inner.last_key.lock() = None;
        Ok(())
    }

    /// Get recorder statistics
    pub fn stats(&self) -> RecorderStats {
        self.inner.stats.lock().clone()
    }
}

/// Counts a failed call if dropped while still armed, which only happens
/// when the wrapped function panics
struct FailureGuard<'a> {
    stats: &'a Mutex<RecorderStats>,
    armed: bool,
}

impl<'a> FailureGuard<'a> {
    fn armed(stats: &'a Mutex<RecorderStats>) -> Self {
        Self { stats, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for FailureGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.stats.lock().calls_failed += 1;
        }
    }
}

/// A function wrapped by a `Watcher`
pub struct Instrumented<F, A, T, E> {
    watcher: Watcher,
    options: LogOptions,
    func: F,
    last_key: Option<ExecutionKey>,
    _signature: PhantomData<fn(A) -> std::result::Result<T, E>>,
}

impl<F, A, T, E> Instrumented<F, A, T, E>
where
    A: Debug,
    T: Debug,
    E: From<WatchdogError>,
    F: FnMut(&mut CaptureContext<'_>, A) -> std::result::Result<T, E>,
{
    /// Invoke the wrapped function and record the call
    pub fn call(&mut self, args: A) -> std::result::Result<T, E> {
        let (value, key) = self.watcher.run(&self.options, &mut self.func, args)?;
        self.last_key = Some(key);
        Ok(value)
    }

    /// Key of this wrapper's most recent recorded call
    pub fn last_key(&self) -> Option<&ExecutionKey> {
        self.last_key.as_ref()
    }

    pub fn options(&self) -> &LogOptions {
        &self.options
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }
}
