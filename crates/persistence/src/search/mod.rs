//! FHIR Search Parameter Management and Extraction.
//!
//! This module provides search support for the store:
//!
//! - [`registry`] - In-memory registry of active SearchParameters
//! - [`loader`] - Loads parameters from the embedded set or SearchParameter JSON
//! - [`util`] - Schema-driven accessors for SearchParameter fields
//! - [`extractor`] - Path-based value extraction from resources
//! - [`converters`] - Conversion between extracted JSON and index values
//! - [`errors`] - Search-specific error types
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use parking_lot::RwLock;
//! use helios_persistence::schema::SchemaRegistry;
//! use helios_persistence::search::{
//!     FhirVersion, SearchParameterExtractor, SearchParameterLoader, SearchParameterRegistry,
//! };
//! use serde_json::json;
//!
//! let schema = Arc::new(SchemaRegistry::with_core_definitions().unwrap());
//! let loader = SearchParameterLoader::new(FhirVersion::R4, schema);
//! let mut registry = SearchParameterRegistry::new();
//! registry.load_all(&loader).unwrap();
//!
//! let extractor = SearchParameterExtractor::new(Arc::new(RwLock::new(registry)));
//! let patient = json!({"resourceType": "Patient", "id": "1", "name": [{"family": "Smith"}]});
//! let values = extractor.extract(&patient, "Patient").unwrap();
//! assert!(values.iter().any(|v| v.param_name == "name"));
//! ```

pub mod converters;
pub mod errors;
pub mod extractor;
pub mod loader;
pub mod registry;
pub mod util;

pub use converters::{IndexValue, ValueConverter};
pub use errors::{ExtractionError, LoaderError, RegistryError};
pub use extractor::{ExtractedValue, SearchParameterExtractor};
pub use loader::{FhirVersion, SearchParameterLoader};
pub use registry::{
    SearchParameterDefinition, SearchParameterRegistry, SearchParameterSource,
    SearchParameterStatus,
};
