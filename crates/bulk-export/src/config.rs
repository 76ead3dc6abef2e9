//! Job parameter names, step names and export settings.

use std::path::PathBuf;

use helios_batch::DEFAULT_CONCURRENCY;
use helios_persistence::core::ExportLevel;
use serde::{Deserialize, Serialize};

/// UUID of the bulk export job entity.
pub const JOB_UUID_PARAMETER: &str = "jobUUID";
/// Number of pids each reader call returns.
pub const READ_CHUNK_PARAMETER: &str = "readChunkSize";
/// Whether group exports follow MDM Person links.
pub const EXPAND_MDM_PARAMETER: &str = "expandMdm";
pub const GROUP_ID_PARAMETER: &str = "groupId";
/// Comma separated resource types.
pub const RESOURCE_TYPES_PARAMETER: &str = "resourceTypes";
pub const OUTPUT_FORMAT_PARAMETER: &str = "outputFormat";
/// RFC 3339 lower bound on last-updated.
pub const SINCE_PARAMETER: &str = "since";

/// Reader pages per written file.
pub const CHUNK_SIZE: usize = 100;

/// Partition context key holding the resource type.
pub const RESOURCE_TYPE_KEY: &str = "resourceType";
/// Partition context key holding the collection id.
pub const COLLECTION_ID_KEY: &str = "bulkExportCollectionEntityId";

pub const BULK_EXPORT_JOB_NAME: &str = "bulkExportJob";
pub const GROUP_BULK_EXPORT_JOB_NAME: &str = "groupBulkExportJob";
pub const PATIENT_BULK_EXPORT_JOB_NAME: &str = "patientBulkExportJob";

pub const CREATE_ENTITY_STEP_NAME: &str = "createBulkExportEntityStep";
pub const PARTITION_STEP_NAME: &str = "partitionStep";
pub const CLOSE_JOB_STEP_NAME: &str = "closeJobStep";

/// The three export job variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExportJobKind {
    System,
    Patient,
    Group,
}

impl ExportJobKind {
    pub fn job_name(&self) -> &'static str {
        match self {
            ExportJobKind::System => BULK_EXPORT_JOB_NAME,
            ExportJobKind::Patient => PATIENT_BULK_EXPORT_JOB_NAME,
            ExportJobKind::Group => GROUP_BULK_EXPORT_JOB_NAME,
        }
    }

    /// Name of the per-partition chunk step.
    pub fn worker_step_name(&self) -> &'static str {
        match self {
            ExportJobKind::System => "bulkExportGenerateResourceFilesStep",
            ExportJobKind::Patient => "patientBulkExportGenerateResourceFilesStep",
            ExportJobKind::Group => "groupBulkExportGenerateResourceFilesStep",
        }
    }

    /// The job variant that serves an export level.
    pub fn for_level(level: &ExportLevel) -> Self {
        match level {
            ExportLevel::System => ExportJobKind::System,
            ExportLevel::Patient => ExportJobKind::Patient,
            ExportLevel::Group { .. } => ExportJobKind::Group,
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./bulk-export")
}

fn default_read_chunk_size() -> u32 {
    10
}

fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}

/// Runtime settings for export jobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkExportSettings {
    /// Directory files are written under, one subdirectory per job.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Pids per reader call when the caller does not choose one.
    #[serde(default = "default_read_chunk_size")]
    pub read_chunk_size: u32,

    /// Partitioner grid size hint.
    #[serde(default = "default_concurrency")]
    pub grid_size: usize,

    /// Partitions run at the same time.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for BulkExportSettings {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            read_chunk_size: default_read_chunk_size(),
            grid_size: default_concurrency(),
            concurrency: default_concurrency(),
        }
    }
}

impl BulkExportSettings {
    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    pub fn with_read_chunk_size(mut self, read_chunk_size: u32) -> Self {
        self.read_chunk_size = read_chunk_size;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}
