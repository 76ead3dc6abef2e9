//! Resource definition registry.

use std::collections::HashMap;

use serde_json::Value;

use super::SchemaError;
use super::definition::ResourceDefinition;

const CORE_DEFINITIONS: &str = include_str!("definitions.json");

/// Maps resource type names to their definitions.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    definitions: HashMap<String, ResourceDefinition>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in resource definitions.
    pub fn with_core_definitions() -> Result<Self, SchemaError> {
        let definitions: Vec<ResourceDefinition> = serde_json::from_str(CORE_DEFINITIONS)
            .map_err(|e| SchemaError::DefinitionLoad {
                message: e.to_string(),
            })?;

        let mut registry = Self::new();
        for def in definitions {
            registry.register(def);
        }
        Ok(registry)
    }

    /// Adds or replaces a definition.
    pub fn register(&mut self, definition: ResourceDefinition) {
        self.definitions
            .insert(definition.name().to_string(), definition);
    }

    /// Returns true if the resource type is known.
    pub fn contains(&self, resource_type: &str) -> bool {
        self.definitions.contains_key(resource_type)
    }

    /// Known resource type names, sorted.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.definitions.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Looks up a definition by type name.
    pub fn definition_by_name(&self, resource_type: &str) -> Result<&ResourceDefinition, SchemaError> {
        self.definitions
            .get(resource_type)
            .ok_or_else(|| SchemaError::UnknownResourceType {
                resource_type: resource_type.to_string(),
            })
    }

    /// Looks up the definition for a resource instance by its `resourceType`.
    ///
    /// Fails when the value is not a JSON object or carries no `resourceType`.
    pub fn resource_definition(&self, resource: &Value) -> Result<&ResourceDefinition, SchemaError> {
        if !resource.is_object() {
            return Err(SchemaError::InvalidResource {
                message: "resource must be a JSON object".to_string(),
            });
        }

        let resource_type = resource
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or_else(|| SchemaError::InvalidResource {
                message: "resource has no resourceType".to_string(),
            })?;

        self.definition_by_name(resource_type)
    }
}
