// src/recording/storage.rs
//! Record persistence on the file system
//!
//! One JSON file per execution key:
//!
//! ```text
//! <logs_dir>/<key>.json         call record
//! <logs_dir>/<key>.vault.json   object vault (when the call stored any)
//! ```

use crate::recording::key::ExecutionKey;
use crate::recording::record::CallRecord;
use crate::recording::vault::Vault;
use crate::utils::errors::{Result, WatchdogError};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RECORD_SUFFIX: &str = ".json";
const VAULT_SUFFIX: &str = ".vault.json";

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding records and vaults
    pub base_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("exp_runs"),
        }
    }
}

/// File-backed record storage
#[derive(Debug, Clone)]
pub struct RecordStorage {
    config: StorageConfig,
}

impl RecordStorage {
    /// Create storage, creating the directory if needed
    pub fn new(config: StorageConfig) -> Result<Self> {
        let storage = Self::open(config);
        storage.ensure_dir()?;
        info!("Record storage initialized at {:?}", storage.config.base_dir);
        Ok(storage)
    }

    /// Storage over a directory that is only created on the first write
    pub fn open(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn base_dir(&self) -> &Path {
        &self.config.base_dir
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.config.base_dir)
            .map_err(|e| WatchdogError::storage(&self.config.base_dir, e))
    }

    pub fn record_path(&self, key: &ExecutionKey) -> PathBuf {
        self.config
            .base_dir
            .join(format!("{}{}", key, RECORD_SUFFIX))
    }

    pub fn vault_path(&self, key: &ExecutionKey) -> PathBuf {
        self.config.base_dir.join(format!("{}{}", key, VAULT_SUFFIX))
    }

    /// Write one record, replacing any file with the same key
    pub fn write_record(&self, key: &ExecutionKey, record: &CallRecord) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.record_path(key);
        let data = serde_json::to_vec(record)?;
        fs::write(&path, data).map_err(|e| WatchdogError::storage(&path, e))?;
        debug!("Wrote record {} to {:?}", key, path);
        Ok(path)
    }

    pub fn read_record(&self, key: &ExecutionKey) -> Result<CallRecord> {
        let path = self.record_path(key);
        let data = fs::read(&path).map_err(|e| WatchdogError::storage(&path, e))?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Write one vault, replacing any file with the same key
    pub fn write_vault(&self, key: &ExecutionKey, vault: &Vault) -> Result<PathBuf> {
        self.ensure_dir()?;
        let path = self.vault_path(key);
        vault.save(&path)?;
        Ok(path)
    }

    pub fn read_vault(&self, key: &ExecutionKey) -> Result<Vault> {
        Vault::load(self.vault_path(key))
    }

    /// Keys of every record in the directory, sorted
    pub fn list_records(&self) -> Result<Vec<ExecutionKey>> {
        self.list_with(|name| {
            if name.ends_with(VAULT_SUFFIX) {
                None
            } else {
                name.strip_suffix(RECORD_SUFFIX)
            }
        })
    }

    /// Keys of every vault in the directory, sorted
    pub fn list_vaults(&self) -> Result<Vec<ExecutionKey>> {
        self.list_with(|name| name.strip_suffix(VAULT_SUFFIX))
    }

    fn list_with(&self, key_of: impl Fn(&str) -> Option<&str>) -> Result<Vec<ExecutionKey>> {
        let entries = fs::read_dir(&self.config.base_dir)
            .map_err(|e| WatchdogError::storage(&self.config.base_dir, e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| WatchdogError::storage(&self.config.base_dir, e))?;
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                warn!("Skipping non UTF-8 file name {:?}", file_name);
                continue;
            };
            if let Some(key) = key_of(name) {
                keys.push(ExecutionKey::new(key));
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Load every record in the directory
    pub fn load_records(&self) -> Result<BTreeMap<ExecutionKey, CallRecord>> {
        self.list_records()?
            .into_iter()
            .map(|key| {
                let record = self.read_record(&key)?;
                Ok::<_, WatchdogError>((key, record))
            })
            .collect()
    }

    /// Get storage statistics
    pub fn stats(&self) -> Result<StorageStats> {
        let records = self.list_records()?;
        let vaults = self.list_vaults()?;

        let total_size_bytes = records
            .iter()
            .map(|key| self.record_path(key))
            .chain(vaults.iter().map(|key| self.vault_path(key)))
            .filter_map(|path| fs::metadata(path).ok())
            .map(|meta| meta.len())
            .sum();

        Ok(StorageStats {
            total_records: records.len() as u64,
            total_vaults: vaults.len() as u64,
            total_size_bytes,
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub total_records: u64,
    pub total_vaults: u64,
    pub total_size_bytes: u64,
}
