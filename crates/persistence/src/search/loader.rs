//! SearchParameter Loader.
//!
//! Loads SearchParameter definitions from the embedded R4 set or from
//! SearchParameter resources supplied as JSON.

use std::sync::Arc;

use serde_json::Value;

use crate::schema::SchemaRegistry;
use crate::types::SearchParamType;

use super::errors::LoaderError;
use super::registry::{SearchParameterDefinition, SearchParameterSource, SearchParameterStatus};
use super::util;

const EMBEDDED_R4_PARAMETERS: &str = include_str!("search_parameters.json");

/// FHIR version for loading appropriate search parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FhirVersion {
    /// FHIR R4 (4.0.1)
    #[default]
    R4,
}

impl FhirVersion {
    /// Returns the version string.
    pub fn as_str(&self) -> &'static str {
        match self {
            FhirVersion::R4 => "R4",
        }
    }
}

/// Loader for SearchParameter definitions.
///
/// `code`, `expression` and `base` are read through the schema registry.
pub struct SearchParameterLoader {
    fhir_version: FhirVersion,
    schema: Arc<SchemaRegistry>,
}

impl SearchParameterLoader {
    /// Creates a new loader for the specified FHIR version.
    pub fn new(fhir_version: FhirVersion, schema: Arc<SchemaRegistry>) -> Self {
        Self {
            fhir_version,
            schema,
        }
    }

    /// Returns the FHIR version.
    pub fn version(&self) -> FhirVersion {
        self.fhir_version
    }

    /// Loads embedded standard parameters for the FHIR version.
    pub fn load_embedded(&self) -> Result<Vec<SearchParameterDefinition>, LoaderError> {
        let source = match self.fhir_version {
            FhirVersion::R4 => EMBEDDED_R4_PARAMETERS,
        };

        let json: Value =
            serde_json::from_str(source).map_err(|e| LoaderError::EmbeddedLoadFailed {
                version: self.fhir_version.as_str().to_string(),
                message: e.to_string(),
            })?;

        let mut params = self.load_from_json(&json)?;
        for param in &mut params {
            param.source = SearchParameterSource::Embedded;
        }
        Ok(params)
    }

    /// Loads SearchParameter resources from a Bundle, an array, or a single
    /// resource. Entries of other types are skipped.
    pub fn load_from_json(&self, json: &Value) -> Result<Vec<SearchParameterDefinition>, LoaderError> {
        let candidates: Vec<&Value> = if let Some(entries) = json.get("entry").and_then(Value::as_array) {
            entries.iter().filter_map(|entry| entry.get("resource")).collect()
        } else if let Some(array) = json.as_array() {
            array.iter().collect()
        } else {
            vec![json]
        };

        candidates
            .into_iter()
            .filter(|resource| is_search_parameter(resource))
            .map(|resource| self.parse_resource(resource))
            .collect()
    }

    /// Parses a SearchParameter FHIR resource into a definition.
    pub fn parse_resource(&self, resource: &Value) -> Result<SearchParameterDefinition, LoaderError> {
        let url = resource
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LoaderError::MissingField {
                field: "url".to_string(),
                url: None,
            })?
            .to_string();

        let code = util::code(&self.schema, resource)?.ok_or_else(|| LoaderError::MissingField {
            field: "code".to_string(),
            url: Some(url.clone()),
        })?;

        let type_str = resource
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| LoaderError::MissingField {
                field: "type".to_string(),
                url: Some(url.clone()),
            })?;

        let param_type = type_str.parse::<SearchParamType>().map_err(|_| {
            LoaderError::InvalidResource {
                message: format!("Unknown search parameter type: {}", type_str),
                url: Some(url.clone()),
            }
        })?;

        let expression = util::expression(&self.schema, resource)?.unwrap_or_default();

        // Special parameters may omit the expression
        if expression.is_empty()
            && param_type != SearchParamType::Composite
            && !code.starts_with('_')
        {
            return Err(LoaderError::MissingField {
                field: "expression".to_string(),
                url: Some(url),
            });
        }

        let base = util::base_as_strings(&self.schema, resource)?;

        let target: Option<Vec<String>> = resource.get("target").and_then(|v| v.as_array()).map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        });

        let status = resource
            .get("status")
            .and_then(|v| v.as_str())
            .and_then(SearchParameterStatus::from_fhir_status)
            .unwrap_or(SearchParameterStatus::Active);

        Ok(SearchParameterDefinition {
            url,
            code,
            param_type,
            expression,
            base,
            target,
            status,
            source: SearchParameterSource::Stored,
        })
    }
}

fn is_search_parameter(resource: &Value) -> bool {
    resource.get("resourceType").and_then(|t| t.as_str()) == Some("SearchParameter")
}

impl std::fmt::Debug for SearchParameterLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchParameterLoader")
            .field("fhir_version", &self.fhir_version)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn loader() -> SearchParameterLoader {
        let schema = Arc::new(SchemaRegistry::with_core_definitions().unwrap());
        SearchParameterLoader::new(FhirVersion::R4, schema)
    }

    #[test]
    fn test_load_embedded() {
        let params = loader().load_embedded().unwrap();
        assert!(!params.is_empty());

        let person_identifier = params
            .iter()
            .find(|p| p.url == "http://hl7.org/fhir/SearchParameter/Person-identifier")
            .unwrap();
        assert_eq!(person_identifier.code, "identifier");
        assert_eq!(person_identifier.param_type, SearchParamType::Token);
        assert_eq!(person_identifier.base, vec!["Person"]);
        assert_eq!(person_identifier.source, SearchParameterSource::Embedded);
    }

    #[test]
    fn test_parse_resource() {
        let sp = json!({
            "resourceType": "SearchParameter",
            "url": "http://example.org/sp/eid",
            "code": "eid",
            "base": ["Person", "Patient"],
            "type": "token",
            "expression": "Person.identifier | Patient.identifier",
            "status": "draft"
        });

        let def = loader().parse_resource(&sp).unwrap();
        assert_eq!(def.code, "eid");
        assert_eq!(def.base, vec!["Person", "Patient"]);
        assert_eq!(def.status, SearchParameterStatus::Draft);
        assert_eq!(def.source, SearchParameterSource::Stored);
    }

    #[test]
    fn test_parse_resource_missing_code() {
        let sp = json!({
            "resourceType": "SearchParameter",
            "url": "http://example.org/sp/x",
            "type": "token",
            "expression": "Patient.x"
        });

        let err = loader().parse_resource(&sp).unwrap_err();
        assert!(matches!(err, LoaderError::MissingField { ref field, .. } if field == "code"));
    }

    #[test]
    fn test_parse_resource_missing_expression() {
        let sp = json!({
            "resourceType": "SearchParameter",
            "url": "http://example.org/sp/x",
            "code": "x",
            "type": "string",
            "base": ["Patient"]
        });

        assert!(loader().parse_resource(&sp).is_err());
    }

    #[test]
    fn test_load_from_array() {
        let json = json!([
            {"resourceType": "Patient", "id": "ignored"},
            {
                "resourceType": "SearchParameter",
                "url": "http://example.org/sp/a",
                "code": "a",
                "type": "string",
                "base": ["Patient"],
                "expression": "Patient.a"
            }
        ]);

        let params = loader().load_from_json(&json).unwrap();
        assert_eq!(params.len(), 1);
    }
}
