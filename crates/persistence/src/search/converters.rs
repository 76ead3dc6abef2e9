//! Value Converters for Search Index.
//!
//! Converts extracted JSON values into index-friendly values.
//! Each FHIR data type is mapped to appropriate index columns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::SearchParamType;

/// A value extracted and converted for the search index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexValue {
    /// Lower-cased string value for string parameters.
    String(String),

    /// Token value (code with optional system).
    Token {
        /// Code system URI (e.g., "http://loinc.org").
        system: Option<String>,
        /// Code value.
        code: String,
    },

    /// Reference to another resource.
    Reference {
        /// Reference string (e.g., "Patient/123").
        reference: String,
        /// Resource type if known.
        resource_type: Option<String>,
        /// Resource ID if extractable.
        resource_id: Option<String>,
    },

    /// URI value.
    Uri(String),
}

impl IndexValue {
    /// Creates a string index value.
    pub fn string(s: impl Into<String>) -> Self {
        IndexValue::String(s.into())
    }

    /// Creates a token index value with system and code.
    pub fn token(system: Option<String>, code: impl Into<String>) -> Self {
        IndexValue::Token {
            system,
            code: code.into(),
        }
    }

    /// Creates a reference index value, splitting out type and id when possible.
    pub fn reference(reference: impl Into<String>) -> Self {
        let reference = reference.into();
        let (resource_type, resource_id) = parse_reference(&reference);
        IndexValue::Reference {
            reference,
            resource_type,
            resource_id,
        }
    }

    /// Creates a URI index value.
    pub fn uri(uri: impl Into<String>) -> Self {
        IndexValue::Uri(uri.into())
    }
}

/// Parses a reference string into (resource_type, resource_id).
pub fn parse_reference(reference: &str) -> (Option<String>, Option<String>) {
    // Absolute references keep the last two segments
    if reference.starts_with("http://") || reference.starts_with("https://") {
        let parts: Vec<&str> = reference.rsplitn(3, '/').collect();
        if parts.len() >= 2 {
            return (Some(parts[1].to_string()), Some(parts[0].to_string()));
        }
    }

    let parts: Vec<&str> = reference.split('/').collect();
    if parts.len() == 2 {
        return (Some(parts[0].to_string()), Some(parts[1].to_string()));
    }

    (None, None)
}

/// Converter for transforming JSON values to index values.
pub struct ValueConverter;

impl ValueConverter {
    /// Converts a JSON value to index values based on the target parameter type.
    ///
    /// May return multiple values for arrays or complex types. Types that the
    /// index does not store (dates, numbers, quantities) yield nothing.
    pub fn convert(value: &Value, target_type: SearchParamType) -> Vec<IndexValue> {
        match value {
            Value::Array(arr) => arr
                .iter()
                .flat_map(|item| Self::convert_single(item, target_type))
                .collect(),
            _ => Self::convert_single(value, target_type),
        }
    }

    fn convert_single(value: &Value, target_type: SearchParamType) -> Vec<IndexValue> {
        match target_type {
            SearchParamType::String => Self::convert_to_string(value),
            SearchParamType::Token => Self::convert_to_token(value),
            SearchParamType::Reference => Self::convert_to_reference(value),
            SearchParamType::Uri => match value {
                Value::String(s) => vec![IndexValue::uri(s.clone())],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn convert_to_string(value: &Value) -> Vec<IndexValue> {
        let mut results = Vec::new();

        match value {
            Value::String(s) => results.push(IndexValue::string(s.to_lowercase())),
            Value::Object(obj) => {
                // HumanName
                if let Some(family) = obj.get("family").and_then(|v| v.as_str()) {
                    results.push(IndexValue::string(family.to_lowercase()));
                }
                if let Some(given) = obj.get("given").and_then(|v| v.as_array()) {
                    for g in given.iter().filter_map(|g| g.as_str()) {
                        results.push(IndexValue::string(g.to_lowercase()));
                    }
                }
                if let Some(text) = obj.get("text").and_then(|v| v.as_str()) {
                    results.push(IndexValue::string(text.to_lowercase()));
                }
            }
            _ => {}
        }

        results
    }

    fn convert_to_token(value: &Value) -> Vec<IndexValue> {
        let mut results = Vec::new();

        match value {
            Value::String(s) => results.push(IndexValue::token(None, s.clone())),
            Value::Bool(b) => results.push(IndexValue::token(None, b.to_string())),
            Value::Object(obj) => {
                // Coding
                if let Some(code) = obj.get("code").and_then(|v| v.as_str()) {
                    let system = obj.get("system").and_then(|v| v.as_str()).map(String::from);
                    results.push(IndexValue::token(system, code));
                }

                // CodeableConcept
                if let Some(coding) = obj.get("coding").and_then(|v| v.as_array()) {
                    for c in coding {
                        if let Some(code) = c.get("code").and_then(|v| v.as_str()) {
                            let system = c.get("system").and_then(|v| v.as_str()).map(String::from);
                            results.push(IndexValue::token(system, code));
                        }
                    }
                }

                // Identifier
                if !obj.contains_key("code") && !obj.contains_key("coding") {
                    if let Some(value) = obj.get("value").and_then(|v| v.as_str()) {
                        let system = obj.get("system").and_then(|v| v.as_str()).map(String::from);
                        if !value.is_empty() {
                            results.push(IndexValue::token(system, value));
                        }
                    }
                }
            }
            _ => {}
        }

        results
    }

    fn convert_to_reference(value: &Value) -> Vec<IndexValue> {
        match value {
            Value::String(s) => vec![IndexValue::reference(s.clone())],
            Value::Object(obj) => obj
                .get("reference")
                .and_then(|v| v.as_str())
                .map(|r| vec![IndexValue::reference(r)])
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reference() {
        assert_eq!(
            parse_reference("Patient/123"),
            (Some("Patient".to_string()), Some("123".to_string()))
        );
        assert_eq!(
            parse_reference("http://example.org/fhir/Patient/9"),
            (Some("Patient".to_string()), Some("9".to_string()))
        );
        assert_eq!(parse_reference("#contained"), (None, None));
    }

    #[test]
    fn test_convert_identifier() {
        let values = ValueConverter::convert(
            &json!([{"system": "http://example.org/eid", "value": "E-1"}, {"value": "X"}]),
            SearchParamType::Token,
        );
        assert_eq!(
            values,
            vec![
                IndexValue::token(Some("http://example.org/eid".to_string()), "E-1"),
                IndexValue::token(None, "X"),
            ]
        );
    }

    #[test]
    fn test_convert_codeable_concept() {
        let values = ValueConverter::convert(
            &json!({"coding": [{"system": "http://loinc.org", "code": "1234-5"}], "text": "x"}),
            SearchParamType::Token,
        );
        assert_eq!(
            values,
            vec![IndexValue::token(Some("http://loinc.org".to_string()), "1234-5")]
        );
    }

    #[test]
    fn test_convert_reference_object() {
        let values = ValueConverter::convert(
            &json!({"reference": "Patient/p1", "display": "Pat"}),
            SearchParamType::Reference,
        );
        assert_eq!(
            values,
            vec![IndexValue::Reference {
                reference: "Patient/p1".to_string(),
                resource_type: Some("Patient".to_string()),
                resource_id: Some("p1".to_string()),
            }]
        );
    }

    #[test]
    fn test_convert_human_name() {
        let values = ValueConverter::convert(
            &json!({"family": "Smith", "given": ["John"]}),
            SearchParamType::String,
        );
        assert_eq!(
            values,
            vec![IndexValue::string("smith"), IndexValue::string("john")]
        );
    }

    #[test]
    fn test_unindexed_types_yield_nothing() {
        assert!(ValueConverter::convert(&json!("2020-01-01"), SearchParamType::Date).is_empty());
    }
}
