//! Core storage traits and abstractions.
//!
//! This module provides the foundational traits for the persistence layer:
//!
//! - [`ResourceStorage`] - Core CRUD operations and pid lookups
//! - [`SearchProvider`] - Single-type search over the search index
//! - [`IdHelper`] - Logical id to pid resolution
//! - [`DaoRegistry`] / [`ResourceDao`] - Per-type access built on the above
//! - [`bulk_export`] - Bulk export job entities and pid listings
//!
//! # Trait Hierarchy
//!
//! ```text
//! ResourceStorage
//!     └── SearchProvider ─┐
//!                         ├── FhirStore ──► DaoRegistry ──► ResourceDao
//! IdHelper ───────────────┘
//!
//! BulkExportJobStore
//! ExportPidProvider
//! ```

pub mod bulk_export;
pub mod dao;
pub mod id_helper;
pub mod search;
pub mod storage;

pub use bulk_export::{
    BulkExportCollection, BulkExportCollectionFile, BulkExportJob, BulkExportJobStore,
    BulkJobStatus, ExportLevel, ExportManifest, ExportOutputFile, ExportPidProvider, ExportRequest,
    NDJSON_FORMAT, PatientScope,
};
pub use dao::{DaoMethodOutcome, DaoRegistry, FhirStore, ResourceDao};
pub use id_helper::IdHelper;
pub use search::SearchProvider;
pub use storage::ResourceStorage;
