// src/recording/exporter.rs
//! Export call records for display
//!
//! Supports:
//! - JSON (the persisted record layout, pretty-printed)
//! - Text (one aligned line per field, for terminals)

use crate::recording::key::ExecutionKey;
use crate::recording::record::CallRecord;
use crate::recording::vault::Vault;
use crate::utils::errors::Result;
use std::collections::BTreeMap;
use std::fmt::Write;
use tracing::debug;

/// Export formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// Pretty JSON
    #[default]
    Json,

    /// Human readable text
    Text,
}

/// Exporter for call records
pub struct Exporter {
    format: ExportFormat,
}

impl Exporter {
    pub fn new(format: ExportFormat) -> Self {
        Self { format }
    }

    /// Export one record
    pub fn export_record(&self, key: &ExecutionKey, record: &CallRecord) -> Result<String> {
        debug!("Exporting record {} as {:?}", key, self.format);

        match self.format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(record)?),
            ExportFormat::Text => Ok(record_text(key, record)),
        }
    }

    /// Export one vault
    pub fn export_vault(&self, key: &ExecutionKey, vault: &Vault) -> Result<String> {
        match self.format {
            ExportFormat::Json => Ok(serde_json::to_string_pretty(vault)?),
            ExportFormat::Text => {
                let mut out = format!("{}\n", key);
                for name in vault.names() {
                    let value = vault
                        .get_raw(name)
                        .map(|v| v.to_string())
                        .unwrap_or_default();
                    let _ = writeln!(out, "  {} = {}", name, value);
                }
                Ok(out)
            }
        }
    }

    /// One summary line per record: key and elapsed time
    pub fn summary(&self, records: &BTreeMap<ExecutionKey, CallRecord>) -> Result<String> {
        match self.format {
            ExportFormat::Json => {
                let rows: BTreeMap<&str, String> = records
                    .iter()
                    .map(|(key, record)| (key.as_str(), record.elapsed_text()))
                    .collect();
                Ok(serde_json::to_string_pretty(&rows)?)
            }
            ExportFormat::Text => {
                let width = records.keys().map(|k| k.as_str().len()).max().unwrap_or(0);
                let mut out = String::new();
                for (key, record) in records {
                    let _ = writeln!(
                        out,
                        "{:<width$}  {}",
                        key.as_str(),
                        record.elapsed_text(),
                        width = width
                    );
                }
                Ok(out)
            }
        }
    }
}

fn record_text(key: &ExecutionKey, record: &CallRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", key);
    let _ = writeln!(out, "  start time:   {}", record.start_time_text());
    let _ = writeln!(out, "  end time:     {}", record.end_time_text());
    let _ = writeln!(out, "  elapsed time: {}", record.elapsed_text());
    let _ = writeln!(out, "  input values: {}", record.input_values);
    let _ = writeln!(out, "  return value: {}", record.return_value);

    if let Some(prints) = &record.prints {
        let _ = writeln!(out, "  prints:");
        for line in prints {
            let _ = writeln!(out, "    {}", line);
        }
    }

    if let Some(files) = &record.files {
        let _ = writeln!(out, "  files:");
        for (name, lines) in files {
            let _ = writeln!(out, "    {}:", name);
            for line in lines {
                let _ = writeln!(out, "      {}", line);
            }
        }
    }

    out
}
