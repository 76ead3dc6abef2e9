//! Runs submitted export jobs through the batch launcher.

use std::sync::Arc;

use helios_batch::{BatchError, JobExecution, JobLauncher, JobParameters, JobRepository};
use helios_persistence::StorageError;
use helios_persistence::core::{
    BulkExportJob, BulkJobStatus, ExportLevel, ExportManifest, ExportRequest,
};
use helios_persistence::error::BulkExportError;
use serde::Serialize;

use crate::config::{
    EXPAND_MDM_PARAMETER, ExportJobKind, GROUP_ID_PARAMETER, JOB_UUID_PARAMETER,
    READ_CHUNK_PARAMETER,
};
use crate::error::{ExportError, ExportResult};
use crate::job::BulkExportJobConfig;
use crate::services::ExportServices;
use crate::svc::BulkDataExportSvc;

/// Result of running one export job.
#[derive(Debug, Clone, Serialize)]
pub struct ExportOutcome {
    pub execution: JobExecution,
    /// The job entity after the run.
    pub job: BulkExportJob,
    /// Present when the job completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ExportManifest>,
}

impl ExportOutcome {
    pub fn is_complete(&self) -> bool {
        self.job.status == BulkJobStatus::Complete
    }
}

/// Picks the job variant for a job entity, builds its parameters and
/// launches it.
pub struct BulkExportJobRunner {
    launcher: JobLauncher,
    config: BulkExportJobConfig,
    svc: BulkDataExportSvc,
}

impl BulkExportJobRunner {
    /// Creates a runner with its own in-memory job repository.
    pub fn new(services: Arc<ExportServices>) -> Self {
        Self::with_launcher(services, JobLauncher::new(Arc::new(JobRepository::new())))
    }

    pub fn with_launcher(services: Arc<ExportServices>, launcher: JobLauncher) -> Self {
        Self {
            launcher,
            svc: BulkDataExportSvc::new(Arc::clone(&services.jobs)),
            config: BulkExportJobConfig::new(services),
        }
    }

    pub fn launcher(&self) -> &JobLauncher {
        &self.launcher
    }

    pub fn export_svc(&self) -> &BulkDataExportSvc {
        &self.svc
    }

    /// Submits `request` and runs it to completion.
    pub async fn export(&self, request: ExportRequest) -> ExportResult<ExportOutcome> {
        let job = self.svc.submit_job(request).await?;
        self.run_job(&job.job_id).await
    }

    /// Runs a `SUBMITTED` job entity.
    ///
    /// A job whose parameters fail validation is marked `ERROR` and the
    /// validation error is returned. Failures inside the job leave the
    /// entity in `ERROR` and are reported through the returned execution.
    pub async fn run_job(&self, job_id: &str) -> ExportResult<ExportOutcome> {
        let job = self.svc.get_job_info(job_id).await?;
        if job.status != BulkJobStatus::Submitted {
            return Err(StorageError::BulkExport(BulkExportError::InvalidJobState {
                job_id: job_id.to_string(),
                expected: BulkJobStatus::Submitted.to_string(),
                actual: job.status.to_string(),
            })
            .into());
        }

        let kind = ExportJobKind::for_level(&job.request.level);
        let batch_job = self.config.job_for(kind)?;
        let parameters = self.job_parameters(&job);

        tracing::info!(
            job_uuid = %job_id,
            job = %batch_job.name(),
            parameters = %parameters,
            "Launching bulk export job"
        );

        let execution = match self.launcher.run(&batch_job, parameters).await {
            Ok(execution) => execution,
            Err(err @ BatchError::InvalidJobParameters { .. }) => {
                let message = err.to_string();
                self.config
                    .services()
                    .jobs
                    .set_job_status(job_id, BulkJobStatus::Error, Some(&message))
                    .await?;
                return Err(err.into());
            }
            Err(err) => return Err(err.into()),
        };

        let job = self.svc.get_job_info(job_id).await?;
        if !execution.is_completed() {
            tracing::warn!(
                job_uuid = %job_id,
                status = %job.status,
                failures = ?execution.failures,
                "Bulk export job did not complete"
            );
        }

        let manifest = (job.status == BulkJobStatus::Complete).then(|| job.manifest());
        Ok(ExportOutcome {
            execution,
            job,
            manifest,
        })
    }

    /// Runs every `SUBMITTED` job, oldest first.
    ///
    /// A job that cannot be launched is logged and skipped.
    pub async fn run_pending(&self) -> ExportResult<Vec<ExportOutcome>> {
        let mut outcomes = Vec::new();
        for job in self.svc.list_pending().await? {
            match self.run_job(&job.job_id).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    tracing::warn!(job_uuid = %job.job_id, error = %err, "Skipping bulk export job");
                }
            }
        }
        Ok(outcomes)
    }

    fn job_parameters(&self, job: &BulkExportJob) -> JobParameters {
        let read_chunk_size = self.config.services().settings.read_chunk_size;
        let mut parameters = JobParameters::new()
            .with_string(JOB_UUID_PARAMETER, job.job_id.clone())
            .with_long(READ_CHUNK_PARAMETER, i64::from(read_chunk_size));

        if let ExportLevel::Group { group_id } = &job.request.level {
            parameters = parameters
                .with_string(GROUP_ID_PARAMETER, group_id.clone())
                .with_string(EXPAND_MDM_PARAMETER, job.request.expand_mdm.to_string());
        }
        parameters
    }
}

impl std::fmt::Debug for BulkExportJobRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkExportJobRunner")
            .field("config", &self.config)
            .field("executions", &self.launcher.repository().len())
            .finish()
    }
}
