// src/main.rs
//! labwatch
//!
//! Inspects experiment records and vaults persisted by a `Watcher`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use labwatch::observability::init_tracing;
use labwatch::recording::{ExecutionKey, ExportFormat, Exporter, RecordStorage, StorageConfig};
use labwatch::utils::config::WatcherConfig;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(version, about = "Inspect recorded experiment runs")]
struct Cli {
    /// Logs directory (defaults to the configured `logs_dir`)
    #[arg(long, global = true, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = FormatArg::Text)]
    format: FormatArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List execution keys with their elapsed time
    List,

    /// Print one record
    Show {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Print one vault
    Vault {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Print storage statistics
    Stats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Text,
    Json,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Text => ExportFormat::Text,
            FormatArg::Json => ExportFormat::Json,
        }
    }
}

fn main() -> Result<()> {
    init_tracing()?;
    let cli = Cli::parse();

    let base_dir = match cli.dir {
        Some(dir) => dir,
        None => WatcherConfig::load()?.logs_dir,
    };
    debug!("Reading records from {:?}", base_dir);

    let storage = RecordStorage::open(StorageConfig { base_dir });
    let exporter = Exporter::new(cli.format.into());

    match cli.command {
        Command::List => {
            let records = storage.load_records()?;
            if records.is_empty() {
                info!("No records in {:?}", storage.base_dir());
            }
            print!("{}", exporter.summary(&records)?);
        }
        Command::Show { key } => {
            let key = ExecutionKey::new(key);
            let record = storage
                .read_record(&key)
                .with_context(|| format!("no record for key {}", key))?;
            println!("{}", exporter.export_record(&key, &record)?.trim_end());
        }
        Command::Vault { key } => {
            let key = ExecutionKey::new(key);
            let vault = storage
                .read_vault(&key)
                .with_context(|| format!("no vault for key {}", key))?;
            println!("{}", exporter.export_vault(&key, &vault)?.trim_end());
        }
        Command::Stats => {
            let stats = storage.stats()?;
            println!(
                "{} records, {} vaults, {} bytes",
                stats.total_records, stats.total_vaults, stats.total_size_bytes
            );
        }
    }

    Ok(())
}
