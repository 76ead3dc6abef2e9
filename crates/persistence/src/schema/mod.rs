//! Runtime resource schemas.
//!
//! The schema registry maps a resource type name to a [`ResourceDefinition`]
//! listing its child elements. Each [`ChildDefinition`] knows its cardinality
//! and whether it holds a primitive or a complex value, and hands out a
//! [`ChildAccessor`] that reads the child out of resource JSON.
//!
//! ```
//! use helios_persistence::schema::SchemaRegistry;
//! use serde_json::json;
//!
//! let registry = SchemaRegistry::with_core_definitions().unwrap();
//! let sp = json!({"resourceType": "SearchParameter", "base": ["Patient", "Person"]});
//!
//! let def = registry.resource_definition(&sp).unwrap();
//! let base = def.child_by_name("base").unwrap();
//! assert!(base.is_repeating());
//! assert_eq!(base.accessor().values(&sp).len(), 2);
//! ```

mod definition;
mod registry;

pub use definition::{Cardinality, ChildAccessor, ChildDefinition, ChildKind, ResourceDefinition};
pub use registry::SchemaRegistry;

use thiserror::Error;

/// Errors raised while resolving schemas or reading attributes.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The value is not a resource the registry can type.
    #[error("invalid resource: {message}")]
    InvalidResource {
        /// What was wrong with the value.
        message: String,
    },

    /// No definition is registered for the resource type.
    #[error("unknown resource type: {resource_type}")]
    UnknownResourceType {
        /// The `resourceType` that was looked up.
        resource_type: String,
    },

    /// The resource definition has no child with this name.
    #[error("{resource_type} has no child named '{child}'")]
    UnknownChild {
        /// Type whose definition was searched.
        resource_type: String,
        /// The requested child element.
        child: String,
    },

    /// Definitions could not be loaded.
    #[error("failed to load resource definitions: {message}")]
    DefinitionLoad {
        /// Parser or I/O error text.
        message: String,
    },
}
