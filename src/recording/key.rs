// src/recording/key.rs
//! Execution keys
//!
//! Records are stored under a key derived from the caller-supplied
//! execution name. Reusing a key silently replaces the earlier record.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Timestamp layout used in timestamp-derived keys
const KEY_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%.6f";

/// How execution keys are derived from execution names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScheme {
    /// The bare name; every call overwrites the previous record
    Plain,

    /// `<name>_<start timestamp>`
    #[default]
    Timestamp,

    /// `<name>_<n>` with a per-name counter starting at 0
    Counter,
}

/// Identifier of one recorded invocation
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExecutionKey(String);

impl ExecutionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ExecutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ExecutionKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives execution keys, tracking per-name call counters
#[derive(Debug, Default)]
pub struct KeyGenerator {
    scheme: KeyScheme,
    counters: HashMap<String, u64>,
}

impl KeyGenerator {
    pub fn new(scheme: KeyScheme) -> Self {
        Self {
            scheme,
            counters: HashMap::new(),
        }
    }

    pub fn scheme(&self) -> KeyScheme {
        self.scheme
    }

    /// Key for the next completed call of `name` started at `start`
    pub fn next(&mut self, name: &str, start: &NaiveDateTime) -> ExecutionKey {
        match self.scheme {
            KeyScheme::Plain => ExecutionKey::new(name),
            KeyScheme::Timestamp => {
                ExecutionKey::new(format!("{}_{}", name, start.format(KEY_TIMESTAMP_FORMAT)))
            }
            KeyScheme::Counter => {
                let counter = self.counters.entry(name.to_string()).or_insert(0);
                let key = ExecutionKey::new(format!("{}_{}", name, counter));
                *counter += 1;
                key
            }
        }
    }

    /// Number of keys issued so far for `name` (counter scheme only)
    pub fn calls(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn reset(&mut self) {
        self.counters.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_micro_opt(14, 5, 9, 42)
            .unwrap()
    }

    #[test]
    fn test_plain_keys() {
        let mut keys = KeyGenerator::new(KeyScheme::Plain);
        assert_eq!(keys.next("train", &start()).as_str(), "train");
        assert_eq!(keys.next("train", &start()).as_str(), "train");
    }

    #[test]
    fn test_timestamp_keys() {
        let mut keys = KeyGenerator::new(KeyScheme::Timestamp);
        assert_eq!(
            keys.next("train", &start()).as_str(),
            "train_20240301T140509.000042"
        );
    }

    #[test]
    fn test_counter_keys_per_name() {
        let mut keys = KeyGenerator::new(KeyScheme::Counter);
        assert_eq!(keys.next("test", &start()).as_str(), "test_0");
        assert_eq!(keys.next("test", &start()).as_str(), "test_1");
        assert_eq!(keys.next("main", &start()).as_str(), "main_0");
        assert_eq!(keys.calls("test"), 2);

        keys.reset();
        assert_eq!(keys.next("test", &start()).as_str(), "test_0");
    }

    #[test]
    fn test_scheme_serde() {
        let scheme: KeyScheme = serde_json::from_str("\"counter\"").unwrap();
        assert_eq!(scheme, KeyScheme::Counter);
        assert_eq!(KeyScheme::default(), KeyScheme::Timestamp);
    }

    proptest! {
        #[test]
        fn prop_counter_keys_unique(names in prop::collection::vec("[a-c]{1,2}", 1..40)) {
            let mut keys = KeyGenerator::new(KeyScheme::Counter);
            let mut seen = HashSet::new();
            for name in &names {
                prop_assert!(seen.insert(keys.next(name, &start())));
            }
        }
    }
}
