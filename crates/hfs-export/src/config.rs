//! Command line configuration for `hfs-export`.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HFS_DATABASE_URL` | fhir.db | SQLite database file (`:memory:` for a scratch store) |
//! | `HFS_LOG_LEVEL` | info | Log level |
//! | `HFS_EXPORT_DIR` | ./bulk-export | Directory export files are written under |
//! | `HFS_MDM_RULES` | | MDM rules JSON used by `eid` |

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use helios_bulk_export::BulkExportSettings;
use helios_persistence::core::ExportRequest;

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

/// Top level configuration: global options plus the subcommand to run.
#[derive(Debug, Clone, Parser)]
#[command(name = "hfs-export")]
#[command(about = "Bulk export, NDJSON loading and MDM lookups for a Helios FHIR store")]
pub struct ExportCliConfig {
    /// SQLite database file.
    #[arg(long, env = "HFS_DATABASE_URL", default_value = "fhir.db", global = true)]
    pub database: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "HFS_LOG_LEVEL", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Load NDJSON resources, creating or updating each by id.
    Load {
        /// NDJSON files, one resource per line.
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run an export job and print its manifest.
    Export(ExportArgs),

    /// Print a job entity, with its manifest once complete.
    Status {
        /// Job UUID printed by `export`.
        job_uuid: String,
    },

    /// Find the Person holding an enterprise id.
    Eid {
        /// The EID value.
        value: String,

        /// MDM rules JSON naming the enterprise EID system.
        #[arg(long, env = "HFS_MDM_RULES")]
        mdm_rules: PathBuf,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportLevelArg {
    System,
    Patient,
    Group,
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    #[arg(long, value_enum, default_value_t = ExportLevelArg::System)]
    pub level: ExportLevelArg,

    /// Group to export (group level only).
    #[arg(long)]
    pub group_id: Option<String>,

    /// Resource types to export (comma-separated).
    #[arg(long, value_delimiter = ',', required = true)]
    pub types: Vec<String>,

    /// Only export resources updated at or after this RFC 3339 time.
    #[arg(long)]
    pub since: Option<DateTime<Utc>>,

    /// Expand group members through MDM Person links.
    #[arg(long)]
    pub expand_mdm: bool,

    /// Directory files are written under.
    #[arg(long, env = "HFS_EXPORT_DIR", default_value = "./bulk-export")]
    pub output_dir: PathBuf,

    /// Pids per reader call.
    #[arg(long, default_value_t = 10)]
    pub read_chunk_size: u32,

    /// Resource types exported at the same time.
    #[arg(long, default_value_t = default_concurrency())]
    pub concurrency: usize,
}

fn default_concurrency() -> usize {
    BulkExportSettings::default().concurrency
}

impl ExportArgs {
    pub fn to_request(&self) -> ExportRequest {
        let request = match self.level {
            ExportLevelArg::System => ExportRequest::system(),
            ExportLevelArg::Patient => ExportRequest::patient(),
            ExportLevelArg::Group => ExportRequest::group(self.group_id.clone().unwrap_or_default()),
        };
        let request = request
            .with_types(self.types.iter().map(|t| t.trim()).filter(|t| !t.is_empty()))
            .with_expand_mdm(self.expand_mdm);
        match self.since {
            Some(since) => request.with_since(since),
            None => request,
        }
    }

    pub fn settings(&self) -> BulkExportSettings {
        BulkExportSettings::default()
            .with_output_dir(self.output_dir.clone())
            .with_read_chunk_size(self.read_chunk_size)
            .with_concurrency(self.concurrency)
    }

    fn validate(&self, errors: &mut Vec<String>) {
        if self.read_chunk_size == 0 {
            errors.push("Read chunk size cannot be 0".to_string());
        }
        if self.concurrency == 0 {
            errors.push("Concurrency cannot be 0".to_string());
        }
        if self.types.iter().all(|t| t.trim().is_empty()) {
            errors.push("At least one resource type is required".to_string());
        }

        let has_group = self
            .group_id
            .as_deref()
            .is_some_and(|id| !id.trim().is_empty());
        match self.level {
            ExportLevelArg::Group if !has_group => {
                errors.push("Group exports require --group-id".to_string());
            }
            ExportLevelArg::System | ExportLevelArg::Patient if self.group_id.is_some() => {
                errors.push("--group-id is only valid for group exports".to_string());
            }
            _ => {}
        }
        if self.expand_mdm && self.level != ExportLevelArg::Group {
            errors.push("--expand-mdm is only valid for group exports".to_string());
        }
    }
}

impl ExportCliConfig {
    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.trim().is_empty() {
            errors.push("Database cannot be empty".to_string());
        }
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            errors.push(format!(
                "Log level must be one of {}",
                LOG_LEVELS.join(", ")
            ));
        }

        match &self.command {
            Command::Export(args) => args.validate(&mut errors),
            Command::Status { job_uuid } if job_uuid.trim().is_empty() => {
                errors.push("Job UUID cannot be empty".to_string());
            }
            Command::Eid { value, .. } if value.trim().is_empty() => {
                errors.push("EID value cannot be empty".to_string());
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
