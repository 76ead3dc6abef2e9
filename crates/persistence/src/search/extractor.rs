//! SearchParameter Value Extractor.
//!
//! Evaluates the path expressions of registered search parameters against
//! resource JSON to produce index values. Expressions are dotted paths,
//! optionally prefixed with the resource type and joined with `|`.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::SearchParamType;

use super::converters::{IndexValue, ValueConverter};
use super::errors::ExtractionError;
use super::registry::{SearchParameterDefinition, SearchParameterRegistry};

/// A value extracted from a resource for indexing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedValue {
    /// The parameter name (e.g., "identifier").
    pub param_name: String,

    /// The parameter URL.
    pub param_url: String,

    /// The parameter type.
    pub param_type: SearchParamType,

    /// The extracted and converted value.
    pub value: IndexValue,
}

/// Extracts searchable values from FHIR resources.
pub struct SearchParameterExtractor {
    registry: Arc<RwLock<SearchParameterRegistry>>,
}

impl SearchParameterExtractor {
    /// Creates a new extractor with the given registry.
    pub fn new(registry: Arc<RwLock<SearchParameterRegistry>>) -> Self {
        Self { registry }
    }

    /// Extracts all searchable values from a resource.
    ///
    /// Returns values for all active search parameters that apply to this resource type.
    pub fn extract(
        &self,
        resource: &Value,
        resource_type: &str,
    ) -> Result<Vec<ExtractedValue>, ExtractionError> {
        let obj = resource.as_object().ok_or_else(|| ExtractionError::InvalidResource {
            message: "Resource must be a JSON object".to_string(),
        })?;

        if let Some(rt) = obj.get("resourceType").and_then(|v| v.as_str())
            && rt != resource_type
        {
            return Err(ExtractionError::InvalidResource {
                message: format!("Resource type mismatch: expected {}, got {}", resource_type, rt),
            });
        }

        let params = self.registry.read().get_active_params(resource_type);

        Ok(params
            .iter()
            .flat_map(|param| Self::extract_for_param(resource, resource_type, param))
            .collect())
    }

    /// Extracts values for a specific parameter from a resource.
    pub fn extract_for_param(
        resource: &Value,
        resource_type: &str,
        param: &SearchParameterDefinition,
    ) -> Vec<ExtractedValue> {
        let mut results = Vec::new();

        for path in param.expression.split('|').map(str::trim) {
            let Some(segments) = parse_path(path, resource_type) else {
                continue;
            };

            let mut values = Vec::new();
            navigate(resource, &segments, &mut values);

            for value in values {
                for index_value in ValueConverter::convert(value, param.param_type) {
                    results.push(ExtractedValue {
                        param_name: param.code.clone(),
                        param_url: param.url.clone(),
                        param_type: param.param_type,
                        value: index_value,
                    });
                }
            }
        }

        results
    }
}

/// Splits a path into field names, or `None` if it is rooted at another type.
fn parse_path<'p>(path: &'p str, resource_type: &str) -> Option<Vec<&'p str>> {
    let mut segments: Vec<&str> = path.split('.').filter(|s| !s.is_empty()).collect();

    let first = *segments.first()?;
    if first.chars().next().is_some_and(char::is_uppercase) {
        if first != resource_type && first != "Resource" && first != "DomainResource" {
            return None;
        }
        segments.remove(0);
    }

    Some(segments)
}

fn navigate<'v>(value: &'v Value, segments: &[&str], out: &mut Vec<&'v Value>) {
    let Some((head, rest)) = segments.split_first() else {
        if !value.is_null() {
            out.push(value);
        }
        return;
    };

    match value {
        Value::Object(obj) => {
            if let Some(child) = obj.get(*head) {
                navigate(child, rest, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                navigate(item, segments, out);
            }
        }
        _ => {}
    }
}

impl std::fmt::Debug for SearchParameterExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchParameterExtractor").finish()
    }
}
