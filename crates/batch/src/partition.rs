//! Partitioned steps.
//!
//! A [`Partitioner`] splits the work into named execution contexts; the
//! [`PartitionStep`] runs its worker step once per context with bounded
//! concurrency and fails if any worker fails.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use crate::context::{ExecutionContext, JobScope};
use crate::error::{BatchError, BatchResult};
use crate::execution::StepExecution;
use crate::step::{Step, StepExecutionListener, execute_step};

/// Default number of partitions run at once.
pub const DEFAULT_CONCURRENCY: usize = 4;

/// Splits a step into independently executable partitions.
#[async_trait]
pub trait Partitioner: Send + Sync {
    /// Returns one execution context per partition, keyed by partition name.
    ///
    /// `grid_size` is a hint; partitioners may return more or fewer.
    async fn partition(
        &self,
        scope: &JobScope,
        grid_size: usize,
    ) -> BatchResult<BTreeMap<String, ExecutionContext>>;
}

/// Runs a worker step for every partition.
pub struct PartitionStep {
    name: String,
    partitioner: Arc<dyn Partitioner>,
    worker: Arc<dyn Step>,
    grid_size: usize,
    concurrency: usize,
    listeners: Vec<Arc<dyn StepExecutionListener>>,
}

impl PartitionStep {
    pub fn new(
        name: impl Into<String>,
        partitioner: Arc<dyn Partitioner>,
        worker: Arc<dyn Step>,
    ) -> Self {
        Self {
            name: name.into(),
            partitioner,
            worker,
            grid_size: DEFAULT_CONCURRENCY,
            concurrency: DEFAULT_CONCURRENCY,
            listeners: Vec::new(),
        }
    }

    pub fn with_grid_size(mut self, grid_size: usize) -> Self {
        self.grid_size = grid_size.max(1);
        self
    }

    /// Sets how many partitions may run at the same time.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_listener(mut self, listener: Arc<dyn StepExecutionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn worker(&self) -> &Arc<dyn Step> {
        &self.worker
    }
}

#[async_trait]
impl Step for PartitionStep {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, scope: &JobScope, execution: &mut StepExecution) -> BatchResult<()> {
        let partitions = self.partitioner.partition(scope, self.grid_size).await?;
        tracing::info!(
            step = %self.name,
            partitions = partitions.len(),
            concurrency = self.concurrency,
            "Running partitions"
        );

        let worker_name = self.worker.name().to_string();
        let runs: Vec<_> = partitions
            .into_iter()
            .map(|(partition, context)| {
                let worker = Arc::clone(&self.worker);
                let step_execution = StepExecution::new(format!("{}:{}", worker_name, partition))
                    .with_context(context);
                async move { execute_step(worker.as_ref(), scope, step_execution).await }
            })
            .collect();

        let mut workers: Vec<StepExecution> = stream::iter(runs)
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        workers.sort_by(|a, b| a.step_name.cmp(&b.step_name));

        let mut failures = Vec::new();
        for worker in &workers {
            execution.read_count += worker.read_count;
            execution.filter_count += worker.filter_count;
            execution.write_count += worker.write_count;
            execution.commit_count += worker.commit_count;
            if let Some(message) = worker.failure_message() {
                failures.push(format!("{}: {}", worker.step_name, message));
            }
        }
        execution.partitions = workers;

        if failures.is_empty() {
            Ok(())
        } else {
            Err(BatchError::StepFailed {
                step: self.name.clone(),
                message: failures.join("; "),
            })
        }
    }

    fn listeners(&self) -> &[Arc<dyn StepExecutionListener>] {
        &self.listeners
    }
}
