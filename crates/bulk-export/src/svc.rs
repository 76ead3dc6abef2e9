//! Submission and lookup of bulk export job entities.

use std::sync::Arc;

use helios_persistence::core::{
    BulkExportJob, BulkExportJobStore, BulkJobStatus, ExportLevel, ExportRequest, NDJSON_FORMAT,
};

use crate::error::{ExportError, ExportResult};

/// Creates job entities for export requests and reports on them.
///
/// Submitting a request only records it; [`BulkExportJobRunner`] does the
/// work.
///
/// [`BulkExportJobRunner`]: crate::BulkExportJobRunner
#[derive(Clone)]
pub struct BulkDataExportSvc {
    jobs: Arc<dyn BulkExportJobStore>,
}

impl BulkDataExportSvc {
    pub fn new(jobs: Arc<dyn BulkExportJobStore>) -> Self {
        Self { jobs }
    }

    /// Validates `request` and stores it as a `SUBMITTED` job.
    pub async fn submit_job(&self, request: ExportRequest) -> ExportResult<BulkExportJob> {
        let messages = validate_request(&request);
        if !messages.is_empty() {
            return Err(ExportError::InvalidRequest { messages });
        }

        let job = self.jobs.create_job(&request).await?;
        tracing::info!(
            job_uuid = %job.job_id,
            level = %request.level,
            types = ?request.resource_types,
            "Submitted bulk export job"
        );
        Ok(job)
    }

    pub async fn get_job_info(&self, job_id: &str) -> ExportResult<BulkExportJob> {
        self.jobs
            .get_job(job_id)
            .await?
            .ok_or_else(|| ExportError::JobNotFound {
                job_id: job_id.to_string(),
            })
    }

    /// Jobs still waiting to run, oldest first.
    pub async fn list_pending(&self) -> ExportResult<Vec<BulkExportJob>> {
        let mut pending: Vec<BulkExportJob> = self
            .jobs
            .list_jobs(false)
            .await?
            .into_iter()
            .filter(|job| job.status == BulkJobStatus::Submitted)
            .collect();
        pending.sort_by_key(|job| job.created_at);
        Ok(pending)
    }
}

fn validate_request(request: &ExportRequest) -> Vec<String> {
    let mut messages = Vec::new();

    if request.resource_types.iter().all(|t| t.trim().is_empty()) {
        messages.push("At least one resource type must be requested".to_string());
    }
    if request.resource_types.iter().any(|t| t == "Binary") {
        messages.push("Bulk export of Binary resources is forbidden".to_string());
    }
    if request.output_format != NDJSON_FORMAT {
        messages.push(format!(
            "The only allowed format for Bulk Export is currently {}",
            NDJSON_FORMAT
        ));
    }
    if let ExportLevel::Group { group_id } = &request.level
        && group_id.trim().is_empty()
    {
        messages.push("Group Bulk Export jobs must have a groupId attribute".to_string());
    }

    messages
}
