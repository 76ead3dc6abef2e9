//! Step listeners that move the job entity through its states.

use std::sync::Arc;

use async_trait::async_trait;
use helios_batch::{BatchError, BatchResult, BatchStatus, JobScope, StepExecution, StepExecutionListener};
use helios_persistence::core::{BulkExportJobStore, BulkJobStatus};

use crate::config::JOB_UUID_PARAMETER;
use crate::tasklet::job_uuid;

/// Moves the job entity to `BUILDING` once the entity step completes.
pub struct BulkExportCreateEntityStepListener {
    jobs: Arc<dyn BulkExportJobStore>,
}

impl BulkExportCreateEntityStepListener {
    pub fn new(jobs: Arc<dyn BulkExportJobStore>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl StepExecutionListener for BulkExportCreateEntityStepListener {
    async fn after_step(&self, scope: &JobScope, execution: &StepExecution) -> BatchResult<()> {
        if execution.status != BatchStatus::Completed {
            return Ok(());
        }
        let job_uuid = job_uuid(scope)?;
        self.jobs
            .set_job_status(&job_uuid, BulkJobStatus::Building, None)
            .await
            .map_err(BatchError::listener)
    }
}

/// Marks the job entity `ERROR` when a file generation step fails.
pub struct BulkExportGenerateResourceFilesStepListener {
    jobs: Arc<dyn BulkExportJobStore>,
}

impl BulkExportGenerateResourceFilesStepListener {
    pub fn new(jobs: Arc<dyn BulkExportJobStore>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl StepExecutionListener for BulkExportGenerateResourceFilesStepListener {
    async fn after_step(&self, scope: &JobScope, execution: &StepExecution) -> BatchResult<()> {
        if !execution.is_failed() {
            return Ok(());
        }

        let job_uuid = match execution.execution_context.get_string(JOB_UUID_PARAMETER) {
            Some(uuid) => uuid.to_string(),
            None => job_uuid(scope)?,
        };
        let description = execution
            .failure_message()
            .unwrap_or_else(|| format!("{} failed", execution.step_name));

        tracing::warn!(
            job_uuid = %job_uuid,
            step = %execution.step_name,
            error = %description,
            "Bulk export file generation failed"
        );
        self.jobs
            .set_job_status(&job_uuid, BulkJobStatus::Error, Some(&description))
            .await
            .map_err(BatchError::listener)
    }
}
