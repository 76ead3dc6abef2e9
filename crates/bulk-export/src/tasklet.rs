//! Tasklets that open and close the job entity.

use std::sync::Arc;

use async_trait::async_trait;
use helios_batch::{
    BatchError, BatchResult, BatchStatus, JobScope, RepeatStatus, StepExecution, Tasklet,
};
use helios_persistence::core::{
    BulkExportJobStore, BulkJobStatus, ExportLevel, ExportRequest, NDJSON_FORMAT,
};
use serde_json::Value;

use crate::config::{
    EXPAND_MDM_PARAMETER, ExportJobKind, GROUP_ID_PARAMETER, JOB_UUID_PARAMETER,
    OUTPUT_FORMAT_PARAMETER, RESOURCE_TYPES_PARAMETER, SINCE_PARAMETER,
};
use crate::validator::parse_resource_types;

/// Returns the job UUID from the job execution context, falling back to the
/// job parameters.
pub fn job_uuid(scope: &JobScope) -> BatchResult<String> {
    scope
        .context_string(JOB_UUID_PARAMETER)
        .or_else(|| scope.parameters().get_string(JOB_UUID_PARAMETER))
        .ok_or_else(|| BatchError::MissingParameter {
            name: JOB_UUID_PARAMETER.to_string(),
        })
}

/// Finds or creates the job entity and records its UUID in the job context.
pub struct CreateBulkExportEntityTasklet {
    jobs: Arc<dyn BulkExportJobStore>,
    kind: ExportJobKind,
}

impl CreateBulkExportEntityTasklet {
    pub fn new(jobs: Arc<dyn BulkExportJobStore>, kind: ExportJobKind) -> Self {
        Self { jobs, kind }
    }

    fn request_from_parameters(&self, scope: &JobScope) -> BatchResult<ExportRequest> {
        let params = scope.parameters();

        let level = match self.kind {
            ExportJobKind::System => ExportLevel::System,
            ExportJobKind::Patient => ExportLevel::Patient,
            ExportJobKind::Group => {
                let group_id = params.get_string(GROUP_ID_PARAMETER).ok_or_else(|| {
                    BatchError::MissingParameter {
                        name: GROUP_ID_PARAMETER.to_string(),
                    }
                })?;
                ExportLevel::group(group_id)
            }
        };

        let types = params
            .get_string(RESOURCE_TYPES_PARAMETER)
            .map(|t| parse_resource_types(&t))
            .unwrap_or_default();

        let mut request = ExportRequest::new(level)
            .with_types(types)
            .with_output_format(
                params
                    .get_string(OUTPUT_FORMAT_PARAMETER)
                    .unwrap_or_else(|| NDJSON_FORMAT.to_string()),
            )
            .with_expand_mdm(params.get_bool(EXPAND_MDM_PARAMETER).unwrap_or(false));
        if let Some(raw) = params.get_string(SINCE_PARAMETER) {
            let since = params.get_date(SINCE_PARAMETER).ok_or_else(|| {
                BatchError::invalid_parameters(format!(
                    "The {} parameter must be an RFC 3339 instant, but was: {}",
                    SINCE_PARAMETER, raw
                ))
            })?;
            request = request.with_since(since);
        }
        Ok(request)
    }
}

#[async_trait]
impl Tasklet for CreateBulkExportEntityTasklet {
    async fn execute(
        &self,
        scope: &JobScope,
        _execution: &mut StepExecution,
    ) -> BatchResult<RepeatStatus> {
        let job_uuid = match scope.parameters().get_string(JOB_UUID_PARAMETER) {
            Some(existing) => existing,
            None => {
                let request = self.request_from_parameters(scope)?;
                let job = self
                    .jobs
                    .create_job(&request)
                    .await
                    .map_err(BatchError::tasklet)?;
                tracing::info!(
                    job_uuid = %job.job_id,
                    job = %scope.job_name(),
                    "Created bulk export job entity from job parameters"
                );
                job.job_id
            }
        };

        scope.put_context(JOB_UUID_PARAMETER, Value::String(job_uuid));
        Ok(RepeatStatus::Finished)
    }
}

/// Marks the job entity `COMPLETE`, or `ERROR` if the job is not running
/// normally.
pub struct BulkExportJobCloser {
    jobs: Arc<dyn BulkExportJobStore>,
}

impl BulkExportJobCloser {
    pub fn new(jobs: Arc<dyn BulkExportJobStore>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl Tasklet for BulkExportJobCloser {
    async fn execute(
        &self,
        scope: &JobScope,
        _execution: &mut StepExecution,
    ) -> BatchResult<RepeatStatus> {
        let job_uuid = job_uuid(scope)?;
        let status = if scope.status() == BatchStatus::Started {
            BulkJobStatus::Complete
        } else {
            BulkJobStatus::Error
        };

        self.jobs
            .set_job_status(&job_uuid, status, None)
            .await
            .map_err(BatchError::tasklet)?;
        tracing::info!(job_uuid = %job_uuid, status = %status, "Closed bulk export job");
        Ok(RepeatStatus::Finished)
    }
}
