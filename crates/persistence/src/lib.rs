//! Helios FHIR Server Persistence Layer
//!
//! This crate provides the storage side of the Helios bulk export and MDM
//! services: a resource model with persistent ids, a runtime schema registry
//! for typed attribute access, a search parameter registry and index, DAO
//! handles per resource type, and the bulk export job entities.
//!
//! # Features
//!
//! - **Schema-driven accessors**: read named child elements of a resource through
//!   its [`ResourceDefinition`](schema::ResourceDefinition)
//! - **Search**: token, reference and string parameters extracted into an index
//! - **Persistent ids**: every stored resource carries a stable numeric pid
//! - **Bulk export entities**: jobs, per-type collections and written files
//!
//! # Backend Features
//!
//! Available backend features:
//! - `sqlite` (default) - SQLite with in-memory and file modes
//!
//! # Architecture
//!
//! - [`types`] - Stored resources, ids and search query types
//! - [`schema`] - Resource definitions and child accessors
//! - [`search`] - Search parameter registry, loader, extractor and field utilities
//! - [`core`] - Storage traits, DAOs and bulk export job traits
//! - [`error`] - Error types for all operations
//! - [`backends`] - Backend implementations
//!
//! # Quick Start
//!
//! ```
//! use helios_persistence::types::StoredResource;
//! use serde_json::json;
//!
//! let resource = StoredResource::new(
//!     "Patient",
//!     "patient-123",
//!     json!({
//!         "resourceType": "Patient",
//!         "id": "patient-123",
//!         "name": [{"family": "Smith", "given": ["John"]}]
//!     }),
//! );
//!
//! assert_eq!(resource.version_id(), "1");
//! assert_eq!(resource.url(), "Patient/patient-123");
//! ```
//!
//! # Search
//!
//! ```
//! use helios_persistence::types::{SearchQuery, SearchValue};
//!
//! let query = SearchQuery::new("Person")
//!     .with_value("identifier", SearchValue::token("http://example.org/eid", "E-42"))
//!     .load_synchronous();
//!
//! assert_eq!(query.parameters.len(), 1);
//! assert!(query.synchronous);
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod schema;
pub mod search;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{StorageError, StorageResult};
pub use types::{IdType, ResourcePid, SearchQuery, StoredResource};

// Re-export core traits
pub use core::{
    BulkExportJobStore, DaoRegistry, ExportPidProvider, FhirStore, IdHelper, ResourceDao,
    ResourceStorage, SearchProvider,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
