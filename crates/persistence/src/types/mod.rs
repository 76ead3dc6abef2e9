//! Core types for the persistence layer.
//!
//! This module provides the fundamental types used throughout the persistence layer:
//!
//! - [`StoredResource`] - A FHIR resource with persistence metadata and transient user data
//! - [`IdType`], [`ResourcePid`] - Logical and persistent resource identifiers
//! - [`SearchParameter`], [`SearchQuery`] - Search parameter types
//!
//! # Example
//!
//! ```
//! use helios_persistence::types::{SearchQuery, SearchValue};
//!
//! let query = SearchQuery::new("Person")
//!     .with_value("identifier", SearchValue::token("http://example.org/eid", "EID-1"))
//!     .load_synchronous()
//!     .with_count(1);
//! assert_eq!(query.parameters.len(), 1);
//! ```

mod id;
mod search_params;
mod stored_resource;

pub use id::{IdType, ResourcePid};

pub use search_params::{SearchParamType, SearchParameter, SearchQuery, SearchResult, SearchValue};

pub use stored_resource::{RESOURCE_PID_KEY, StoredResource, UserData};
