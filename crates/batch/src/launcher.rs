//! Job launching and the in-memory job repository.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::context::JobScope;
use crate::error::BatchResult;
use crate::execution::{BatchStatus, JobExecution, StepExecution};
use crate::job::Job;
use crate::parameters::JobParameters;
use crate::step::execute_step;

/// Keeps job executions in memory for the lifetime of the process.
#[derive(Debug, Default)]
pub struct JobRepository {
    executions: RwLock<HashMap<Uuid, JobExecution>>,
}

impl JobRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an execution.
    pub fn save(&self, execution: &JobExecution) {
        self.executions
            .write()
            .insert(execution.id, execution.clone());
    }

    pub fn get(&self, id: Uuid) -> Option<JobExecution> {
        self.executions.read().get(&id).cloned()
    }

    /// All executions of a job, oldest first.
    pub fn find_by_job_name(&self, job_name: &str) -> Vec<JobExecution> {
        let mut found: Vec<JobExecution> = self
            .executions
            .read()
            .values()
            .filter(|e| e.job_name == job_name)
            .cloned()
            .collect();
        found.sort_by_key(|e| e.start_time);
        found
    }

    /// The most recently started execution of a job.
    pub fn last_execution(&self, job_name: &str) -> Option<JobExecution> {
        self.find_by_job_name(job_name).pop()
    }

    pub fn len(&self) -> usize {
        self.executions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.executions.read().is_empty()
    }
}

/// Validates parameters and runs job steps in order.
#[derive(Debug, Clone)]
pub struct JobLauncher {
    repository: Arc<JobRepository>,
}

impl JobLauncher {
    pub fn new(repository: Arc<JobRepository>) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &Arc<JobRepository> {
        &self.repository
    }

    /// Runs `job` to completion.
    ///
    /// Parameter validation failures are returned as errors and no execution
    /// is recorded. Once the job starts, step failures are reported through
    /// the returned execution's status rather than as errors; the first
    /// failed step stops the job.
    pub async fn run(&self, job: &Job, parameters: JobParameters) -> BatchResult<JobExecution> {
        job.validate(&parameters).await?;

        let scope = JobScope::new(job.name(), parameters.clone());
        let mut execution = JobExecution::new(scope.execution_id(), job.name(), parameters);
        scope.set_status(BatchStatus::Started);
        execution.status = BatchStatus::Started;
        self.repository.save(&execution);

        tracing::info!(
            job = %job.name(),
            execution_id = %execution.id,
            parameters = %execution.parameters,
            "Job started"
        );

        for step in job.steps() {
            let step_execution =
                execute_step(step.as_ref(), &scope, StepExecution::new(step.name())).await;
            let failed = step_execution.is_failed();
            if let Some(message) = step_execution.failure_message().filter(|_| failed) {
                execution.failures.push(message);
            }
            execution.step_executions.push(step_execution);
            self.repository.save(&execution);

            if failed {
                scope.set_status(BatchStatus::Failed);
                break;
            }
        }

        if scope.status() != BatchStatus::Failed {
            scope.set_status(BatchStatus::Completed);
        }
        execution.status = scope.status();
        execution.end_time = Some(Utc::now());
        execution.execution_context = scope.context();
        self.repository.save(&execution);

        match execution.status {
            BatchStatus::Completed => tracing::info!(
                job = %job.name(),
                execution_id = %execution.id,
                "Job completed"
            ),
            _ => tracing::warn!(
                job = %job.name(),
                execution_id = %execution.id,
                failures = ?execution.failures,
                "Job failed"
            ),
        }
        Ok(execution)
    }
}
