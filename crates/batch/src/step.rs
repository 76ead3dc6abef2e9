//! Steps, tasklets and step listeners.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::context::JobScope;
use crate::error::BatchResult;
use crate::execution::{BatchStatus, StepExecution};

/// A unit of work within a job.
#[async_trait]
pub trait Step: Send + Sync {
    /// The step name recorded on its executions.
    fn name(&self) -> &str;

    /// Runs the step body. Counts and context live on `execution`.
    ///
    /// Listeners are not invoked here; use [`execute_step`].
    async fn execute(&self, scope: &JobScope, execution: &mut StepExecution) -> BatchResult<()>;

    /// Listeners invoked around [`execute`](Self::execute).
    fn listeners(&self) -> &[Arc<dyn StepExecutionListener>] {
        &[]
    }
}

/// Callbacks around a step execution.
#[async_trait]
pub trait StepExecutionListener: Send + Sync {
    async fn before_step(&self, _scope: &JobScope, _execution: &StepExecution) -> BatchResult<()> {
        Ok(())
    }

    /// Called after the step body, with the final status already set.
    async fn after_step(&self, _scope: &JobScope, _execution: &StepExecution) -> BatchResult<()> {
        Ok(())
    }
}

/// Whether a tasklet wants to be called again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatStatus {
    Finished,
    Continuable,
}

/// A single-call unit of work, such as creating or closing a job entity.
#[async_trait]
pub trait Tasklet: Send + Sync {
    async fn execute(
        &self,
        scope: &JobScope,
        execution: &mut StepExecution,
    ) -> BatchResult<RepeatStatus>;
}

/// Step that runs a [`Tasklet`] until it reports [`RepeatStatus::Finished`].
pub struct TaskletStep {
    name: String,
    tasklet: Arc<dyn Tasklet>,
    listeners: Vec<Arc<dyn StepExecutionListener>>,
}

impl TaskletStep {
    pub fn new(name: impl Into<String>, tasklet: Arc<dyn Tasklet>) -> Self {
        Self {
            name: name.into(),
            tasklet,
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn StepExecutionListener>) -> Self {
        self.listeners.push(listener);
        self
    }
}

#[async_trait]
impl Step for TaskletStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, scope: &JobScope, execution: &mut StepExecution) -> BatchResult<()> {
        loop {
            let repeat = self.tasklet.execute(scope, execution).await?;
            execution.commit_count += 1;
            if repeat == RepeatStatus::Finished {
                return Ok(());
            }
        }
    }

    fn listeners(&self) -> &[Arc<dyn StepExecutionListener>] {
        &self.listeners
    }
}

/// Runs a step with its listeners and returns the finished execution.
///
/// Errors from the step body or a listener never escape: they mark the
/// execution failed and are recorded in `failures`.
pub async fn execute_step(
    step: &dyn Step,
    scope: &JobScope,
    mut execution: StepExecution,
) -> StepExecution {
    execution.status = BatchStatus::Started;
    execution.start_time = Some(Utc::now());
    tracing::info!(
        job = %scope.job_name(),
        step = %execution.step_name,
        "Step started"
    );

    let mut result = Ok(());
    for listener in step.listeners() {
        result = listener.before_step(scope, &execution).await;
        if result.is_err() {
            break;
        }
    }
    if result.is_ok() {
        result = step.execute(scope, &mut execution).await;
    }

    match result {
        Ok(()) => execution.status = BatchStatus::Completed,
        Err(e) => {
            execution.status = BatchStatus::Failed;
            execution.failures.push(e.to_string());
        }
    }
    execution.end_time = Some(Utc::now());

    for listener in step.listeners() {
        if let Err(e) = listener.after_step(scope, &execution).await {
            tracing::warn!(
                step = %execution.step_name,
                error = %e,
                "Step listener failed"
            );
            execution.status = BatchStatus::Failed;
            execution.failures.push(e.to_string());
        }
    }

    if execution.is_failed() {
        tracing::warn!(
            job = %scope.job_name(),
            step = %execution.step_name,
            failures = ?execution.failures,
            "Step failed"
        );
    } else {
        tracing::info!(
            job = %scope.job_name(),
            step = %execution.step_name,
            read = execution.read_count,
            written = execution.write_count,
            commits = execution.commit_count,
            "Step completed"
        );
    }
    execution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BatchError;
    use crate::parameters::JobParameters;
    use parking_lot::Mutex;

    struct CountdownTasklet {
        remaining: Mutex<u32>,
    }

    #[async_trait]
    impl Tasklet for CountdownTasklet {
        async fn execute(
            &self,
            _scope: &JobScope,
            _execution: &mut StepExecution,
        ) -> BatchResult<RepeatStatus> {
            let mut remaining = self.remaining.lock();
            *remaining -= 1;
            Ok(if *remaining == 0 {
                RepeatStatus::Finished
            } else {
                RepeatStatus::Continuable
            })
        }
    }

    struct FailingTasklet;

    #[async_trait]
    impl Tasklet for FailingTasklet {
        async fn execute(
            &self,
            _scope: &JobScope,
            _execution: &mut StepExecution,
        ) -> BatchResult<RepeatStatus> {
            Err(BatchError::tasklet("boom"))
        }
    }

    #[derive(Default)]
    struct RecordingListener {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl StepExecutionListener for RecordingListener {
        async fn before_step(&self, _scope: &JobScope, execution: &StepExecution) -> BatchResult<()> {
            self.seen.lock().push(format!("before:{}", execution.status));
            Ok(())
        }

        async fn after_step(&self, _scope: &JobScope, execution: &StepExecution) -> BatchResult<()> {
            self.seen.lock().push(format!("after:{}", execution.status));
            Ok(())
        }
    }

    fn scope() -> JobScope {
        JobScope::new("testJob", JobParameters::new())
    }

    #[tokio::test]
    async fn test_tasklet_repeats_until_finished() {
        let step = TaskletStep::new(
            "countdown",
            Arc::new(CountdownTasklet {
                remaining: Mutex::new(3),
            }),
        );
        let execution = execute_step(&step, &scope(), StepExecution::new("countdown")).await;

        assert_eq!(execution.status, BatchStatus::Completed);
        assert_eq!(execution.commit_count, 3);
        assert!(execution.end_time.is_some());
    }

    #[tokio::test]
    async fn test_listeners_see_final_status() {
        let listener = Arc::new(RecordingListener::default());
        let step = TaskletStep::new("failing", Arc::new(FailingTasklet))
            .with_listener(listener.clone());

        let execution = execute_step(&step, &scope(), StepExecution::new("failing")).await;

        assert!(execution.is_failed());
        assert_eq!(execution.failures, vec!["tasklet failed: boom".to_string()]);
        assert_eq!(
            *listener.seen.lock(),
            vec!["before:STARTED".to_string(), "after:FAILED".to_string()]
        );
    }
}
