//! Execution records for jobs and steps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::parameters::JobParameters;

/// Lifecycle status of a job or step execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BatchStatus {
    Starting,
    Started,
    Completed,
    Failed,
}

impl BatchStatus {
    /// True once the execution can no longer change state.
    pub fn is_finished(&self) -> bool {
        matches!(self, BatchStatus::Completed | BatchStatus::Failed)
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BatchStatus::Starting => "STARTING",
            BatchStatus::Started => "STARTED",
            BatchStatus::Completed => "COMPLETED",
            BatchStatus::Failed => "FAILED",
        };
        write!(f, "{}", s)
    }
}

/// Record of one step run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepExecution {
    pub step_name: String,
    pub status: BatchStatus,
    /// Items returned by the reader.
    pub read_count: u64,
    /// Items dropped by the processor.
    pub filter_count: u64,
    /// Items handed to the writer.
    pub write_count: u64,
    /// Chunks (or tasklet iterations) committed.
    pub commit_count: u64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// Failure descriptions, in the order they happened.
    pub failures: Vec<String>,
    /// Step-scoped state. Partition steps seed this for their workers.
    pub execution_context: ExecutionContext,
    /// Worker executions of a partitioned step.
    pub partitions: Vec<StepExecution>,
}

impl StepExecution {
    pub fn new(step_name: impl Into<String>) -> Self {
        Self {
            step_name: step_name.into(),
            status: BatchStatus::Starting,
            read_count: 0,
            filter_count: 0,
            write_count: 0,
            commit_count: 0,
            start_time: None,
            end_time: None,
            failures: Vec::new(),
            execution_context: ExecutionContext::new(),
            partitions: Vec::new(),
        }
    }

    /// Seeds the step execution context.
    pub fn with_context(mut self, context: ExecutionContext) -> Self {
        self.execution_context = context;
        self
    }

    pub fn is_failed(&self) -> bool {
        self.status == BatchStatus::Failed
    }

    /// Joined failure descriptions, or `None` when the step had none.
    pub fn failure_message(&self) -> Option<String> {
        if self.failures.is_empty() {
            None
        } else {
            Some(self.failures.join("; "))
        }
    }
}

/// Record of one job run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobExecution {
    pub id: Uuid,
    pub job_name: String,
    pub parameters: JobParameters,
    pub status: BatchStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub step_executions: Vec<StepExecution>,
    pub execution_context: ExecutionContext,
    pub failures: Vec<String>,
}

impl JobExecution {
    pub fn new(id: Uuid, job_name: impl Into<String>, parameters: JobParameters) -> Self {
        Self {
            id,
            job_name: job_name.into(),
            parameters,
            status: BatchStatus::Starting,
            start_time: Utc::now(),
            end_time: None,
            step_executions: Vec::new(),
            execution_context: ExecutionContext::new(),
            failures: Vec::new(),
        }
    }

    /// Finds a top-level step execution by name.
    pub fn step(&self, name: &str) -> Option<&StepExecution> {
        self.step_executions.iter().find(|s| s.step_name == name)
    }

    pub fn is_completed(&self) -> bool {
        self.status == BatchStatus::Completed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display_and_finished() {
        assert_eq!(BatchStatus::Completed.to_string(), "COMPLETED");
        assert!(BatchStatus::Failed.is_finished());
        assert!(!BatchStatus::Started.is_finished());
        assert_eq!(
            serde_json::to_string(&BatchStatus::Started).unwrap(),
            "\"STARTED\""
        );
    }

    #[test]
    fn test_failure_message() {
        let mut step = StepExecution::new("closeJobStep");
        assert!(step.failure_message().is_none());

        step.failures.push("first".to_string());
        step.failures.push("second".to_string());
        assert_eq!(step.failure_message().as_deref(), Some("first; second"));
    }
}
