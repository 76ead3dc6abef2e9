//! Schema-driven accessors for SearchParameter fields.
//!
//! These read `base`, `code` and `expression` through the resource definition
//! of the instance rather than by poking at JSON keys directly, so a schema
//! that lacks one of those children is reported as an error instead of
//! silently returning nothing.

use serde_json::Value;

use crate::schema::{ChildAccessor, SchemaError, SchemaRegistry};

/// Returns the string value of every occurrence of the `base` child.
///
/// ```
/// use helios_persistence::schema::SchemaRegistry;
/// use helios_persistence::search::util;
/// use serde_json::json;
///
/// let registry = SchemaRegistry::with_core_definitions().unwrap();
/// let sp = json!({"resourceType": "SearchParameter", "base": ["Patient", "Group"]});
/// assert_eq!(util::base_as_strings(&registry, &sp).unwrap(), vec!["Patient", "Group"]);
/// ```
pub fn base_as_strings(registry: &SchemaRegistry, resource: &Value) -> Result<Vec<String>, SchemaError> {
    all_strings(registry, resource, "base")
}

/// Returns the first value of the `code` child, or `None` when absent.
pub fn code(registry: &SchemaRegistry, resource: &Value) -> Result<Option<String>, SchemaError> {
    first_string(registry, resource, "code")
}

/// Returns the first value of the `expression` child, or `None` when absent.
pub fn expression(registry: &SchemaRegistry, resource: &Value) -> Result<Option<String>, SchemaError> {
    first_string(registry, resource, "expression")
}

fn all_strings(
    registry: &SchemaRegistry,
    resource: &Value,
    child_name: &str,
) -> Result<Vec<String>, SchemaError> {
    let accessor = accessor_for(registry, resource, child_name)?;
    Ok(accessor
        .values(resource)
        .into_iter()
        .filter_map(ChildAccessor::primitive_string)
        .collect())
}

fn first_string(
    registry: &SchemaRegistry,
    resource: &Value,
    child_name: &str,
) -> Result<Option<String>, SchemaError> {
    let accessor = accessor_for(registry, resource, child_name)?;
    Ok(accessor
        .first_value(resource)
        .and_then(ChildAccessor::primitive_string))
}

fn accessor_for<'r>(
    registry: &'r SchemaRegistry,
    resource: &Value,
    child_name: &str,
) -> Result<ChildAccessor<'r>, SchemaError> {
    let definition = registry.resource_definition(resource)?;
    definition
        .child_by_name(child_name)
        .map(|child| child.accessor())
        .ok_or_else(|| SchemaError::UnknownChild {
            resource_type: definition.name().to_string(),
            child: child_name.to_string(),
        })
}
