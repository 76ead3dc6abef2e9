//! Assembly of the three bulk export jobs.
//!
//! Every job runs the same three steps:
//!
//! 1. `createBulkExportEntityStep` finds or creates the job entity and moves
//!    it to `BUILDING`
//! 2. `partitionStep` runs one chunk step per resource type, each writing
//!    NDJSON files for its collection
//! 3. `closeJobStep` marks the entity `COMPLETE`
//!
//! The variants differ only in the reader used by the chunk steps and in the
//! group job's extra `groupId` check.

use std::sync::Arc;

use helios_batch::{
    BatchResult, ChunkStep, ExecutionContext, ItemReader, ItemWriter, Job, JobScope,
    PartitionStep, ReaderFactory, Step, TaskletStep, WriterFactory,
};
use helios_persistence::types::StoredResource;

use crate::config::{
    CHUNK_SIZE, CLOSE_JOB_STEP_NAME, CREATE_ENTITY_STEP_NAME, ExportJobKind, PARTITION_STEP_NAME,
};
use crate::listener::{
    BulkExportCreateEntityStepListener, BulkExportGenerateResourceFilesStepListener,
};
use crate::partitioner::ResourceTypePartitioner;
use crate::processor::PidToResourceProcessor;
use crate::reader::{BulkItemReader, GroupBulkItemReader, PatientBulkItemReader, PidPage};
use crate::services::ExportServices;
use crate::tasklet::{BulkExportJobCloser, CreateBulkExportEntityTasklet};
use crate::validator::{BulkExportJobParameterValidator, GroupIdPresentValidator};
use crate::writer::ResourceToFileWriter;

/// Builds export jobs wired to one set of services.
#[derive(Debug, Clone)]
pub struct BulkExportJobConfig {
    services: Arc<ExportServices>,
}

impl BulkExportJobConfig {
    pub fn new(services: Arc<ExportServices>) -> Self {
        Self { services }
    }

    pub fn services(&self) -> &Arc<ExportServices> {
        &self.services
    }

    /// System level export of every resource of the requested types.
    pub fn bulk_export_job(&self) -> BatchResult<Job> {
        self.build(ExportJobKind::System)
    }

    /// Export of the compartments of a group's members.
    pub fn group_bulk_export_job(&self) -> BatchResult<Job> {
        self.build(ExportJobKind::Group)
    }

    /// Export of every patient compartment.
    pub fn patient_bulk_export_job(&self) -> BatchResult<Job> {
        self.build(ExportJobKind::Patient)
    }

    pub fn job_for(&self, kind: ExportJobKind) -> BatchResult<Job> {
        match kind {
            ExportJobKind::System => self.bulk_export_job(),
            ExportJobKind::Patient => self.patient_bulk_export_job(),
            ExportJobKind::Group => self.group_bulk_export_job(),
        }
    }

    fn build(&self, kind: ExportJobKind) -> BatchResult<Job> {
        let jobs = &self.services.jobs;

        let mut builder = Job::builder(kind.job_name());
        if kind == ExportJobKind::Group {
            builder = builder.validator(Arc::new(GroupIdPresentValidator));
        }

        builder
            .validator(Arc::new(BulkExportJobParameterValidator::new(Arc::clone(jobs))))
            .start(self.create_entity_step(kind))
            .next(self.partition_step(kind))
            .next(self.close_job_step())
            .build()
    }

    fn create_entity_step(&self, kind: ExportJobKind) -> Arc<dyn Step> {
        let jobs = &self.services.jobs;
        Arc::new(
            TaskletStep::new(
                CREATE_ENTITY_STEP_NAME,
                Arc::new(CreateBulkExportEntityTasklet::new(Arc::clone(jobs), kind)),
            )
            .with_listener(Arc::new(BulkExportCreateEntityStepListener::new(
                Arc::clone(jobs),
            ))),
        )
    }

    fn partition_step(&self, kind: ExportJobKind) -> Arc<dyn Step> {
        let settings = &self.services.settings;
        Arc::new(
            PartitionStep::new(
                PARTITION_STEP_NAME,
                Arc::new(ResourceTypePartitioner::new(Arc::clone(&self.services.jobs))),
                self.generate_files_step(kind),
            )
            .with_grid_size(settings.grid_size)
            .with_concurrency(settings.concurrency),
        )
    }

    fn generate_files_step(&self, kind: ExportJobKind) -> Arc<dyn Step> {
        let services = &self.services;
        let step: ChunkStep<PidPage, Vec<StoredResource>> = ChunkStep::new(
            kind.worker_step_name(),
            CHUNK_SIZE,
            self.reader_factory(kind),
            Arc::new(PidToResourceProcessor::new(Arc::clone(&services.store))),
            self.writer_factory(),
        )
        .with_listener(Arc::new(BulkExportGenerateResourceFilesStepListener::new(
            Arc::clone(&services.jobs),
        )));
        Arc::new(step)
    }

    fn close_job_step(&self) -> Arc<dyn Step> {
        Arc::new(TaskletStep::new(
            CLOSE_JOB_STEP_NAME,
            Arc::new(BulkExportJobCloser::new(Arc::clone(&self.services.jobs))),
        ))
    }

    fn reader_factory(&self, kind: ExportJobKind) -> ReaderFactory<PidPage> {
        let services = Arc::clone(&self.services);
        Arc::new(
            move |scope: &JobScope,
                  context: &ExecutionContext|
                  -> BatchResult<Box<dyn ItemReader<PidPage>>> {
                let jobs = &services.jobs;
                let pids = &services.pids;
                let reader: Box<dyn ItemReader<PidPage>> = match kind {
                    ExportJobKind::System => {
                        Box::new(BulkItemReader::new(jobs, pids, scope, context)?)
                    }
                    ExportJobKind::Patient => {
                        Box::new(PatientBulkItemReader::new(jobs, pids, scope, context)?)
                    }
                    ExportJobKind::Group => Box::new(GroupBulkItemReader::new(
                        jobs,
                        pids,
                        Arc::clone(&services.store),
                        services.link_expansion.clone(),
                        scope,
                        context,
                    )?),
                };
                Ok(reader)
            },
        )
    }

    fn writer_factory(&self) -> WriterFactory<Vec<StoredResource>> {
        let services = Arc::clone(&self.services);
        Arc::new(
            move |scope: &JobScope,
                  context: &ExecutionContext|
                  -> BatchResult<Box<dyn ItemWriter<Vec<StoredResource>>>> {
                Ok(Box::new(ResourceToFileWriter::from_context(
                    &services.jobs,
                    &services.settings.output_dir,
                    scope,
                    context,
                )?))
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BulkExportSettings;
    use helios_persistence::backends::sqlite::SqliteBackend;

    fn config() -> BulkExportJobConfig {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        let services =
            ExportServices::for_sqlite(&Arc::new(backend), BulkExportSettings::default()).unwrap();
        BulkExportJobConfig::new(Arc::new(services))
    }

    #[test]
    fn test_job_layouts() {
        let config = config();

        let job = config.bulk_export_job().unwrap();
        assert_eq!(job.name(), "bulkExportJob");
        assert_eq!(
            job.step_names(),
            vec!["createBulkExportEntityStep", "partitionStep", "closeJobStep"]
        );
        assert_eq!(job.validator_count(), 1);

        let job = config.patient_bulk_export_job().unwrap();
        assert_eq!(job.name(), "patientBulkExportJob");
        assert_eq!(job.validator_count(), 1);

        let job = config.job_for(ExportJobKind::Group).unwrap();
        assert_eq!(job.name(), "groupBulkExportJob");
        assert_eq!(job.validator_count(), 2);
    }
}
