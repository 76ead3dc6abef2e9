//! Chunk-oriented steps.

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::{ExecutionContext, JobScope};
use crate::error::BatchResult;
use crate::execution::StepExecution;
use crate::item::{ItemProcessor, ItemReader, ItemWriter};
use crate::step::{Step, StepExecutionListener};

/// Builds a reader for one step execution from the job scope and the step
/// execution context. Readers are step-scoped: every execution (and every
/// partition) gets a fresh one.
pub type ReaderFactory<I> =
    Arc<dyn Fn(&JobScope, &ExecutionContext) -> BatchResult<Box<dyn ItemReader<I>>> + Send + Sync>;

/// Builds a writer for one step execution.
pub type WriterFactory<O> =
    Arc<dyn Fn(&JobScope, &ExecutionContext) -> BatchResult<Box<dyn ItemWriter<O>>> + Send + Sync>;

/// Reads, processes and writes items in chunks of a fixed size.
pub struct ChunkStep<I, O> {
    name: String,
    chunk_size: usize,
    reader: ReaderFactory<I>,
    processor: Arc<dyn ItemProcessor<I, O>>,
    writer: WriterFactory<O>,
    listeners: Vec<Arc<dyn StepExecutionListener>>,
}

impl<I, O> ChunkStep<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    /// Creates a chunk step. A `chunk_size` of zero is treated as one.
    pub fn new(
        name: impl Into<String>,
        chunk_size: usize,
        reader: ReaderFactory<I>,
        processor: Arc<dyn ItemProcessor<I, O>>,
        writer: WriterFactory<O>,
    ) -> Self {
        Self {
            name: name.into(),
            chunk_size: chunk_size.max(1),
            reader,
            processor,
            writer,
            listeners: Vec::new(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn StepExecutionListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

#[async_trait]
impl<I, O> Step for ChunkStep<I, O>
where
    I: Send + 'static,
    O: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute(&self, scope: &JobScope, execution: &mut StepExecution) -> BatchResult<()> {
        let mut reader = (self.reader)(scope, &execution.execution_context)?;
        let mut writer = (self.writer)(scope, &execution.execution_context)?;

        loop {
            let mut chunk = Vec::with_capacity(self.chunk_size);
            let mut exhausted = false;

            while chunk.len() < self.chunk_size {
                match reader.read().await? {
                    Some(item) => {
                        execution.read_count += 1;
                        match self.processor.process(item).await? {
                            Some(out) => chunk.push(out),
                            None => execution.filter_count += 1,
                        }
                    }
                    None => {
                        exhausted = true;
                        break;
                    }
                }
            }

            if !chunk.is_empty() {
                let size = chunk.len() as u64;
                writer.write(chunk).await?;
                execution.write_count += size;
                execution.commit_count += 1;
                tracing::debug!(
                    step = %execution.step_name,
                    items = size,
                    commits = execution.commit_count,
                    "Chunk written"
                );
            }

            if exhausted {
                return Ok(());
            }
        }
    }

    fn listeners(&self) -> &[Arc<dyn StepExecutionListener>] {
        &self.listeners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BatchError;
    use crate::execution::BatchStatus;
    use crate::item::{IteratorItemReader, PassThroughProcessor};
    use crate::parameters::JobParameters;
    use crate::step::execute_step;
    use parking_lot::Mutex;

    struct CollectingWriter {
        chunks: Arc<Mutex<Vec<Vec<u32>>>>,
    }

    #[async_trait]
    impl ItemWriter<u32> for CollectingWriter {
        async fn write(&mut self, items: Vec<u32>) -> BatchResult<()> {
            if items.contains(&13) {
                return Err(BatchError::write("unlucky item"));
            }
            self.chunks.lock().push(items);
            Ok(())
        }
    }

    struct DropEven;

    #[async_trait]
    impl ItemProcessor<u32, u32> for DropEven {
        async fn process(&self, item: u32) -> BatchResult<Option<u32>> {
            Ok((item % 2 == 1).then_some(item))
        }
    }

    fn step(
        items: Vec<u32>,
        processor: Arc<dyn ItemProcessor<u32, u32>>,
        chunks: Arc<Mutex<Vec<Vec<u32>>>>,
    ) -> ChunkStep<u32, u32> {
        let reader: ReaderFactory<u32> = Arc::new(move |_: &JobScope, _: &ExecutionContext| {
            Ok(Box::new(IteratorItemReader::new(items.clone())) as Box<dyn ItemReader<u32>>)
        });
        let writer: WriterFactory<u32> = Arc::new(move |_: &JobScope, _: &ExecutionContext| {
            Ok(Box::new(CollectingWriter {
                chunks: Arc::clone(&chunks),
            }) as Box<dyn ItemWriter<u32>>)
        });
        ChunkStep::new("numbers", 2, reader, processor, writer)
    }

    #[tokio::test]
    async fn test_items_are_written_in_chunks() {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let step = step(vec![1, 2, 3, 4, 5], Arc::new(PassThroughProcessor), chunks.clone());
        let scope = JobScope::new("job", JobParameters::new());

        let execution = execute_step(&step, &scope, StepExecution::new("numbers")).await;

        assert_eq!(execution.status, BatchStatus::Completed);
        assert_eq!(execution.read_count, 5);
        assert_eq!(execution.write_count, 5);
        assert_eq!(execution.commit_count, 3);
        assert_eq!(*chunks.lock(), vec![vec![1, 2], vec![3, 4], vec![5]]);
    }

    #[tokio::test]
    async fn test_filtered_items_are_counted() {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let step = step(vec![1, 2, 3, 4, 5], Arc::new(DropEven), chunks.clone());
        let scope = JobScope::new("job", JobParameters::new());

        let execution = execute_step(&step, &scope, StepExecution::new("numbers")).await;

        assert_eq!(execution.filter_count, 2);
        assert_eq!(execution.write_count, 3);
        assert_eq!(*chunks.lock(), vec![vec![1, 3], vec![5]]);
    }

    #[tokio::test]
    async fn test_empty_input_writes_nothing() {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let step = step(vec![], Arc::new(PassThroughProcessor), chunks.clone());
        let scope = JobScope::new("job", JobParameters::new());

        let execution = execute_step(&step, &scope, StepExecution::new("numbers")).await;

        assert_eq!(execution.status, BatchStatus::Completed);
        assert_eq!(execution.commit_count, 0);
        assert!(chunks.lock().is_empty());
    }

    #[tokio::test]
    async fn test_writer_failure_fails_step() {
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let step = step(vec![1, 2, 13, 14], Arc::new(PassThroughProcessor), chunks.clone());
        let scope = JobScope::new("job", JobParameters::new());

        let execution = execute_step(&step, &scope, StepExecution::new("numbers")).await;

        assert!(execution.is_failed());
        assert_eq!(execution.commit_count, 1);
        assert_eq!(
            execution.failure_message().as_deref(),
            Some("write failed: unlucky item")
        );
    }
}
