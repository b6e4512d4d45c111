// src/recording/vault.rs
//! Object vault
//!
//! A free-form side channel: an instrumented call stashes named objects
//! into its vault through `CaptureContext::vault()`, and the watcher keeps
//! the vault under the same execution key as the call's record.

use crate::utils::errors::{Result, WatchdogError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Named objects collected during one call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vault {
    stored_objects: BTreeMap<String, Value>,
}

impl Vault {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an object under `name`, replacing any previous one
    pub fn set<T: Serialize + ?Sized>(&mut self, name: impl Into<String>, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.stored_objects.insert(name.into(), value);
        Ok(())
    }

    /// Fetch and decode the object stored under `name`
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        self.stored_objects
            .get(name)
            .map(|value| serde_json::from_value(value.clone()).map_err(WatchdogError::from))
            .transpose()
    }

    /// Stored object without decoding
    pub fn get_raw(&self, name: &str) -> Option<&Value> {
        self.stored_objects.get(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.stored_objects.remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stored_objects.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stored_objects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.stored_objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stored_objects.is_empty()
    }

    /// Write the vault as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = serde_json::to_vec_pretty(self)?;
        fs::write(path, data).map_err(|e| WatchdogError::storage(path, e))?;
        debug!("Saved vault with {} objects to {:?}", self.len(), path);
        Ok(())
    }

    /// Read a vault written by `save`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| WatchdogError::storage(path, e))?;
        Ok(serde_json::from_slice(&data)?)
    }
}

impl fmt::Display for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.names().collect();
        write!(f, "Vault with objects ({})", names.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Scores {
        train: f64,
        test: f64,
    }

    #[test]
    fn test_set_get() {
        let mut vault = Vault::new();
        vault.set("epochs", &20u32).unwrap();
        vault
            .set("scores", &Scores { train: 0.98, test: 0.91 })
            .unwrap();

        assert_eq!(vault.len(), 2);
        assert_eq!(vault.get::<u32>("epochs").unwrap(), Some(20));
        assert_eq!(
            vault.get::<Scores>("scores").unwrap(),
            Some(Scores { train: 0.98, test: 0.91 })
        );
        assert_eq!(vault.get::<u32>("missing").unwrap(), None);
    }

    #[test]
    fn test_get_wrong_type() {
        let mut vault = Vault::new();
        vault.set("name", "svm").unwrap();
        assert!(vault.get::<u32>("name").is_err());
        assert_eq!(vault.get_raw("name"), Some(&Value::from("svm")));
    }

    #[test]
    fn test_display() {
        let mut vault = Vault::new();
        vault.set("b", &1).unwrap();
        vault.set("a", &2).unwrap();
        assert_eq!(vault.to_string(), "Vault with objects (a,b)");
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.vault.json");

        let mut vault = Vault::new();
        vault.set("weights", &vec![0.5, 0.25]).unwrap();
        vault.save(&path).unwrap();

        let loaded = Vault::load(&path).unwrap();
        assert_eq!(loaded, vault);
        assert_eq!(loaded.get::<Vec<f64>>("weights").unwrap(), Some(vec![0.5, 0.25]));
    }
}
