//! Helios batch job framework.
//!
//! A small, explicit job framework for long-running exports: a [`Job`] is an
//! ordered list of [`Step`]s guarded by parameter validators and run by a
//! [`JobLauncher`]. Steps come in three shapes:
//!
//! - [`TaskletStep`] runs a single [`Tasklet`]
//! - [`ChunkStep`] pulls items from an [`ItemReader`], passes them through an
//!   [`ItemProcessor`] and writes them in chunks with an [`ItemWriter`]
//! - [`PartitionStep`] splits work with a [`Partitioner`] and runs a worker
//!   step per partition with bounded concurrency
//!
//! Readers and writers are built per step execution by factories, so each
//! partition gets its own instances seeded from its execution context.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use helios_batch::{
//!     BatchResult, Job, JobLauncher, JobParameters, JobRepository, JobScope, RepeatStatus,
//!     StepExecution, Tasklet, TaskletStep,
//! };
//!
//! struct Hello;
//!
//! #[async_trait]
//! impl Tasklet for Hello {
//!     async fn execute(&self, scope: &JobScope, _: &mut StepExecution) -> BatchResult<RepeatStatus> {
//!         scope.put_context("greeting", serde_json::json!("hello"));
//!         Ok(RepeatStatus::Finished)
//!     }
//! }
//!
//! let runtime = tokio::runtime::Runtime::new().unwrap();
//! runtime.block_on(async {
//!     let job = Job::builder("helloJob")
//!         .start(Arc::new(TaskletStep::new("helloStep", Arc::new(Hello))))
//!         .build()
//!         .unwrap();
//!     let launcher = JobLauncher::new(Arc::new(JobRepository::new()));
//!     let execution = launcher.run(&job, JobParameters::new()).await.unwrap();
//!     assert!(execution.is_completed());
//! });
//! ```

pub mod chunk;
pub mod context;
pub mod error;
pub mod execution;
pub mod item;
pub mod job;
pub mod launcher;
pub mod parameters;
pub mod partition;
pub mod step;

pub use chunk::{ChunkStep, ReaderFactory, WriterFactory};
pub use context::{ExecutionContext, JobScope};
pub use error::{BatchError, BatchResult, BoxError, ItemStage};
pub use execution::{BatchStatus, JobExecution, StepExecution};
pub use item::{ItemProcessor, ItemReader, ItemWriter, IteratorItemReader, PassThroughProcessor};
pub use job::{CompositeJobParametersValidator, Job, JobBuilder, JobParametersValidator, RequiredKeysValidator};
pub use launcher::{JobLauncher, JobRepository};
pub use parameters::{JobParameterValue, JobParameters};
pub use partition::{DEFAULT_CONCURRENCY, PartitionStep, Partitioner};
pub use step::{RepeatStatus, Step, StepExecutionListener, Tasklet, TaskletStep, execute_step};
