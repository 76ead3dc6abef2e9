//! Bulk export job entities and traits.
//!
//! This module provides the persisted state of a FHIR Bulk Data export: the
//! job entity, one collection per exported resource type and the files written
//! for each collection, plus the queries exporters use to list resource pids.
//!
//! # Export Levels
//!
//! - **System-level** (`[base]/$export`) - Exports all resources in the system
//! - **Patient-level** (`[base]/Patient/$export`) - Exports all patient compartment resources
//! - **Group-level** (`[base]/Group/[id]/$export`) - Exports resources for patients in a group
//!
//! # Job lifecycle
//!
//! ```text
//! SUBMITTED ──► BUILDING ──► COMPLETE
//!     │            │
//!     └────────────┴──────► ERROR
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StorageResult;
use crate::types::ResourcePid;

/// The only output format bulk export writes.
pub const NDJSON_FORMAT: &str = "application/fhir+ndjson";

/// Status of a bulk export job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BulkJobStatus {
    /// Job entity created, export not started.
    Submitted,
    /// Files are being written.
    Building,
    /// All files written.
    Complete,
    /// The export failed.
    Error,
}

impl BulkJobStatus {
    /// Returns true if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }
}

impl std::fmt::Display for BulkJobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submitted => write!(f, "SUBMITTED"),
            Self::Building => write!(f, "BUILDING"),
            Self::Complete => write!(f, "COMPLETE"),
            Self::Error => write!(f, "ERROR"),
        }
    }
}

impl std::str::FromStr for BulkJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBMITTED" => Ok(Self::Submitted),
            "BUILDING" => Ok(Self::Building),
            "COMPLETE" => Ok(Self::Complete),
            "ERROR" => Ok(Self::Error),
            _ => Err(format!("unknown bulk job status: {}", s)),
        }
    }
}

/// Level at which the export is being performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportLevel {
    /// System-level export (`[base]/$export`).
    System,
    /// Patient-level export (`[base]/Patient/$export`).
    Patient,
    /// Group-level export (`[base]/Group/[id]/$export`).
    Group {
        /// The group ID to export.
        group_id: String,
    },
}

impl ExportLevel {
    /// Creates a group-level export for the given group ID.
    pub fn group(group_id: impl Into<String>) -> Self {
        Self::Group {
            group_id: group_id.into(),
        }
    }
}

impl std::fmt::Display for ExportLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::Patient => write!(f, "patient"),
            Self::Group { group_id } => write!(f, "group/{}", group_id),
        }
    }
}

/// Request parameters for an export job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportRequest {
    /// The level at which to perform the export.
    pub level: ExportLevel,

    /// Resource types to export.
    #[serde(default)]
    pub resource_types: Vec<String>,

    /// Only include resources modified since this time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,

    /// Output format.
    #[serde(default = "default_output_format")]
    pub output_format: String,

    /// Expand group members through MDM links.
    #[serde(default)]
    pub expand_mdm: bool,
}

fn default_output_format() -> String {
    NDJSON_FORMAT.to_string()
}

impl ExportRequest {
    /// Creates a new export request with the given level.
    pub fn new(level: ExportLevel) -> Self {
        Self {
            level,
            resource_types: Vec::new(),
            since: None,
            output_format: default_output_format(),
            expand_mdm: false,
        }
    }

    /// Creates a system-level export request.
    pub fn system() -> Self {
        Self::new(ExportLevel::System)
    }

    /// Creates a patient-level export request.
    pub fn patient() -> Self {
        Self::new(ExportLevel::Patient)
    }

    /// Creates a group-level export request.
    pub fn group(group_id: impl Into<String>) -> Self {
        Self::new(ExportLevel::group(group_id))
    }

    /// Sets the resource types to export.
    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.resource_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the since filter.
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Sets the output format.
    pub fn with_output_format(mut self, format: impl Into<String>) -> Self {
        self.output_format = format.into();
        self
    }

    /// Enables MDM expansion of group members.
    pub fn with_expand_mdm(mut self, expand: bool) -> Self {
        self.expand_mdm = expand;
        self
    }

    /// Returns the group ID if this is a group-level export.
    pub fn group_id(&self) -> Option<&str> {
        match &self.level {
            ExportLevel::Group { group_id } => Some(group_id),
            _ => None,
        }
    }

    /// Renders the request as the `$export` URL a client would have called.
    pub fn request_url(&self) -> String {
        let mut url = match &self.level {
            ExportLevel::System => "$export".to_string(),
            ExportLevel::Patient => "Patient/$export".to_string(),
            ExportLevel::Group { group_id } => format!("Group/{}/$export", group_id),
        };

        let mut params = vec![format!("_outputFormat={}", self.output_format)];
        if !self.resource_types.is_empty() {
            params.push(format!("_type={}", self.resource_types.join(",")));
        }
        if let Some(since) = self.since {
            params.push(format!("_since={}", since.to_rfc3339()));
        }
        if self.expand_mdm {
            params.push("_mdm=true".to_string());
        }

        url.push('?');
        url.push_str(&params.join("&"));
        url
    }
}

/// A file written for one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkExportCollectionFile {
    /// Row id.
    pub id: i64,
    /// Where the file was written.
    pub file_url: String,
    /// Number of resources in the file.
    pub resource_count: u64,
}

/// The output of one resource type within a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkExportCollection {
    /// Row id.
    pub id: i64,
    /// The resource type this collection holds.
    pub resource_type: String,
    /// Files written so far.
    pub files: Vec<BulkExportCollectionFile>,
}

impl BulkExportCollection {
    /// Total resources across all files.
    pub fn resource_count(&self) -> u64 {
        self.files.iter().map(|f| f.resource_count).sum()
    }
}

/// A persisted bulk export job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkExportJob {
    /// The job UUID.
    pub job_id: String,
    /// Current status.
    pub status: BulkJobStatus,
    /// Description of the last status change, set on errors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// What was requested.
    pub request: ExportRequest,
    /// When the job was created.
    pub created_at: DateTime<Utc>,
    /// When the status last changed.
    pub status_time: DateTime<Utc>,
    /// One collection per requested resource type.
    pub collections: Vec<BulkExportCollection>,
}

impl BulkExportJob {
    /// Finds the collection for a resource type.
    pub fn collection_for(&self, resource_type: &str) -> Option<&BulkExportCollection> {
        self.collections
            .iter()
            .find(|c| c.resource_type == resource_type)
    }

    /// Builds the export manifest from the collections written so far.
    pub fn manifest(&self) -> ExportManifest {
        let mut manifest = ExportManifest::new(self.created_at, self.request.request_url());

        for collection in &self.collections {
            for file in &collection.files {
                manifest = manifest.with_output(
                    ExportOutputFile::new(&collection.resource_type, &file.file_url)
                        .with_count(file.resource_count),
                );
            }
        }

        if let Some(message) = &self.status_message {
            manifest = manifest.with_message(message.clone());
        }

        manifest
    }
}

/// An output file in the export manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportOutputFile {
    /// The resource type contained in this file.
    #[serde(rename = "type")]
    pub resource_type: String,
    /// URL to access the file.
    pub url: String,
    /// Number of resources in the file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
}

impl ExportOutputFile {
    /// Creates a new output file descriptor.
    pub fn new(resource_type: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            url: url.into(),
            count: None,
        }
    }

    /// Sets the count.
    pub fn with_count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

/// The export manifest returned when an export completes.
///
/// This follows the FHIR Bulk Data Export manifest format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportManifest {
    /// Time the export was initiated.
    #[serde(rename = "transactionTime")]
    pub transaction_time: DateTime<Utc>,
    /// The original export request URL.
    pub request: String,
    /// Whether a token is needed to fetch the files.
    #[serde(rename = "requiresAccessToken")]
    pub requires_access_token: bool,
    /// Output files containing the exported resources.
    pub output: Vec<ExportOutputFile>,
    /// Output files containing OperationOutcome resources for errors.
    #[serde(default)]
    pub error: Vec<ExportOutputFile>,
    /// Informational messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExportManifest {
    /// Creates a new export manifest.
    pub fn new(transaction_time: DateTime<Utc>, request: impl Into<String>) -> Self {
        Self {
            transaction_time,
            request: request.into(),
            requires_access_token: false,
            output: Vec::new(),
            error: Vec::new(),
            message: None,
        }
    }

    /// Adds an output file.
    pub fn with_output(mut self, file: ExportOutputFile) -> Self {
        self.output.push(file);
        self
    }

    /// Sets a message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Total resources across all output files.
    pub fn total_count(&self) -> u64 {
        self.output.iter().filter_map(|f| f.count).sum()
    }
}

/// Which patients a compartment listing covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatientScope {
    /// Every patient.
    Any,
    /// Only these patient logical ids.
    Members(Vec<String>),
}

// ============================================================================
// Traits
// ============================================================================

/// Storage for bulk export job entities.
#[async_trait]
pub trait BulkExportJobStore: Send + Sync {
    /// Creates a job in `SUBMITTED` state with one collection per requested type.
    async fn create_job(&self, request: &ExportRequest) -> StorageResult<BulkExportJob>;

    /// Loads a job with its collections and files.
    async fn get_job(&self, job_id: &str) -> StorageResult<Option<BulkExportJob>>;

    /// Sets the job status and status message.
    ///
    /// # Errors
    ///
    /// * `BulkExportError::JobNotFound` - If the job doesn't exist
    async fn set_job_status(
        &self,
        job_id: &str,
        status: BulkJobStatus,
        message: Option<&str>,
    ) -> StorageResult<()>;

    /// Loads a collection with its files.
    ///
    /// # Errors
    ///
    /// * `BulkExportError::CollectionNotFound` - If the collection doesn't exist
    async fn get_collection(&self, collection_id: i64) -> StorageResult<BulkExportCollection>;

    /// Records a file written for a collection.
    async fn add_collection_file(
        &self,
        collection_id: i64,
        file_url: &str,
        resource_count: u64,
    ) -> StorageResult<BulkExportCollectionFile>;

    /// Lists jobs, newest first.
    async fn list_jobs(&self, include_terminal: bool) -> StorageResult<Vec<BulkExportJob>>;
}

/// Lists resource pids for export readers.
///
/// Listings are keyset-paged: pass the last pid of the previous page as
/// `after` to fetch the next one. Pages are ordered by pid ascending.
#[async_trait]
pub trait ExportPidProvider: Send + Sync {
    /// Lists pids of every live resource of a type.
    async fn list_resource_pids(
        &self,
        resource_type: &str,
        since: Option<DateTime<Utc>>,
        after: Option<ResourcePid>,
        limit: u32,
    ) -> StorageResult<Vec<ResourcePid>>;

    /// Lists pids of resources in the patient compartment.
    ///
    /// For `Patient` this lists the patients themselves. For other types it
    /// lists resources whose `patient` or `subject` reference points at an
    /// in-scope patient. A type with neither parameter fails with
    /// [`BulkExportError::NotInPatientCompartment`](crate::error::BulkExportError::NotInPatientCompartment).
    async fn list_compartment_pids(
        &self,
        resource_type: &str,
        scope: &PatientScope,
        since: Option<DateTime<Utc>>,
        after: Option<ResourcePid>,
        limit: u32,
    ) -> StorageResult<Vec<ResourcePid>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_job_status() {
        assert!(BulkJobStatus::Complete.is_terminal());
        assert!(BulkJobStatus::Error.is_terminal());
        assert!(!BulkJobStatus::Building.is_terminal());

        assert_eq!(BulkJobStatus::Building.to_string(), "BUILDING");
        assert_eq!(
            "SUBMITTED".parse::<BulkJobStatus>().unwrap(),
            BulkJobStatus::Submitted
        );
        assert!("submitted".parse::<BulkJobStatus>().is_err());
    }

    #[test]
    fn test_export_request_builder() {
        let request = ExportRequest::group("grp-123")
            .with_types(["Patient", "Observation"])
            .with_expand_mdm(true);

        assert_eq!(request.group_id(), Some("grp-123"));
        assert_eq!(request.resource_types, vec!["Patient", "Observation"]);
        assert_eq!(request.output_format, NDJSON_FORMAT);
        assert!(request.expand_mdm);
        assert_eq!(ExportRequest::system().group_id(), None);
    }

    #[test]
    fn test_request_url() {
        let request = ExportRequest::group("g1").with_types(["Patient"]);
        assert_eq!(
            request.request_url(),
            "Group/g1/$export?_outputFormat=application/fhir+ndjson&_type=Patient"
        );
    }

    #[test]
    fn test_job_manifest() {
        let now = Utc::now();
        let job = BulkExportJob {
            job_id: "job-1".to_string(),
            status: BulkJobStatus::Complete,
            status_message: None,
            request: ExportRequest::system().with_types(["Patient"]),
            created_at: now,
            status_time: now,
            collections: vec![BulkExportCollection {
                id: 1,
                resource_type: "Patient".to_string(),
                files: vec![
                    BulkExportCollectionFile {
                        id: 1,
                        file_url: "/out/job-1/Patient-1.ndjson".to_string(),
                        resource_count: 1000,
                    },
                    BulkExportCollectionFile {
                        id: 2,
                        file_url: "/out/job-1/Patient-2.ndjson".to_string(),
                        resource_count: 5,
                    },
                ],
            }],
        };

        assert_eq!(job.collection_for("Patient").unwrap().resource_count(), 1005);
        let manifest = job.manifest();
        assert_eq!(manifest.output.len(), 2);
        assert_eq!(manifest.total_count(), 1005);
        assert_eq!(manifest.transaction_time, now);

        let json = serde_json::to_value(&manifest).unwrap();
        assert_eq!(json["output"][0]["type"], "Patient");
    }
}
