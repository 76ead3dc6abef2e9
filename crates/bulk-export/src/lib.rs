//! Helios FHIR bulk data export.
//!
//! Exports run as [`helios_batch`] jobs. Three variants share one layout:
//!
//! | Job | Reads |
//! |-----|-------|
//! | `bulkExportJob` | every resource of each requested type |
//! | `patientBulkExportJob` | the patient compartment |
//! | `groupBulkExportJob` | the compartments of a group's members, optionally expanded through MDM links |
//!
//! Each job creates (or reuses) a job entity, partitions the work by
//! resource type, writes NDJSON files per partition and closes the entity.
//! See [`job`] for the step layout.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use helios_bulk_export::{BulkExportJobRunner, BulkExportSettings, ExportServices};
//! use helios_persistence::backends::sqlite::SqliteBackend;
//! use helios_persistence::core::ExportRequest;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = Arc::new(SqliteBackend::open("fhir.db")?);
//! backend.init_schema()?;
//!
//! let services = ExportServices::for_sqlite(&backend, BulkExportSettings::default())?;
//! let runner = BulkExportJobRunner::new(Arc::new(services));
//!
//! let outcome = runner
//!     .export(ExportRequest::system().with_types(["Patient", "Observation"]))
//!     .await?;
//! if let Some(manifest) = outcome.manifest {
//!     println!("{}", serde_json::to_string_pretty(&manifest)?);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod job;
pub mod listener;
pub mod partitioner;
pub mod processor;
pub mod reader;
pub mod runner;
pub mod services;
pub mod svc;
pub mod tasklet;
pub mod validator;
pub mod writer;

pub use config::{BulkExportSettings, CHUNK_SIZE, ExportJobKind};
pub use error::{ExportError, ExportResult};
pub use job::BulkExportJobConfig;
pub use listener::{BulkExportCreateEntityStepListener, BulkExportGenerateResourceFilesStepListener};
pub use partitioner::ResourceTypePartitioner;
pub use processor::PidToResourceProcessor;
pub use reader::{BulkItemReader, GroupBulkItemReader, PatientBulkItemReader, PidPage};
pub use runner::{BulkExportJobRunner, ExportOutcome};
pub use services::ExportServices;
pub use svc::BulkDataExportSvc;
pub use tasklet::{BulkExportJobCloser, CreateBulkExportEntityTasklet};
pub use validator::{BulkExportJobParameterValidator, GroupIdPresentValidator};
pub use writer::ResourceToFileWriter;
