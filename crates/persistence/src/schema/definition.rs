//! Resource and child element definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Maximum cardinality of a child element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Cardinality {
    /// `max = 1`
    #[serde(rename = "1")]
    Single,
    /// `max = *`
    #[serde(rename = "*")]
    Many,
}

/// What a child element holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ChildKind {
    /// A FHIR primitive such as `code`, `string` or `uri`.
    Primitive {
        /// The primitive type name.
        #[serde(rename = "type")]
        type_name: String,
    },
    /// A datatype or backbone element.
    Complex,
}

/// A named child element of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildDefinition {
    name: String,
    max: Cardinality,
    #[serde(flatten)]
    kind: ChildKind,
}

impl ChildDefinition {
    /// Creates a primitive child.
    pub fn primitive(name: impl Into<String>, max: Cardinality, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            max,
            kind: ChildKind::Primitive {
                type_name: type_name.into(),
            },
        }
    }

    /// Creates a complex child.
    pub fn complex(name: impl Into<String>, max: Cardinality) -> Self {
        Self {
            name: name.into(),
            max,
            kind: ChildKind::Complex,
        }
    }

    /// The element name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The maximum cardinality.
    pub fn max(&self) -> Cardinality {
        self.max
    }

    /// The element kind.
    pub fn kind(&self) -> &ChildKind {
        &self.kind
    }

    /// Returns true for `max = *` children.
    pub fn is_repeating(&self) -> bool {
        self.max == Cardinality::Many
    }

    /// Returns true for primitive children.
    pub fn is_primitive(&self) -> bool {
        matches!(self.kind, ChildKind::Primitive { .. })
    }

    /// Returns an accessor that reads this child out of resource JSON.
    pub fn accessor(&self) -> ChildAccessor<'_> {
        ChildAccessor { child: self }
    }
}

/// Reads the values of one child element.
#[derive(Debug, Clone, Copy)]
pub struct ChildAccessor<'a> {
    child: &'a ChildDefinition,
}

impl<'a> ChildAccessor<'a> {
    /// Returns every value of the child, in document order.
    ///
    /// JSON arrays are flattened; a repeating child stored as a single value
    /// is returned as one value. JSON nulls are skipped.
    pub fn values<'v>(&self, resource: &'v Value) -> Vec<&'v Value> {
        match resource.get(self.child.name()) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().filter(|v| !v.is_null()).collect(),
            Some(value) => vec![value],
        }
    }

    /// Returns the first value of the child, if present.
    pub fn first_value<'v>(&self, resource: &'v Value) -> Option<&'v Value> {
        self.values(resource).into_iter().next()
    }

    /// Renders a primitive value as a string.
    ///
    /// Strings are returned as-is, numbers and booleans as their JSON text.
    /// Objects and arrays are not primitives and yield `None`.
    pub fn primitive_string(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

/// The definition of one resource type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDefinition {
    name: String,
    children: Vec<ChildDefinition>,
}

impl ResourceDefinition {
    /// Creates a definition from its children.
    pub fn new(name: impl Into<String>, children: Vec<ChildDefinition>) -> Self {
        Self {
            name: name.into(),
            children,
        }
    }

    /// The resource type name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// All child definitions.
    pub fn children(&self) -> &[ChildDefinition] {
        &self.children
    }

    /// Looks up a child by name.
    pub fn child_by_name(&self, name: &str) -> Option<&ChildDefinition> {
        self.children.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_values_flatten_arrays() {
        let base = ChildDefinition::primitive("base", Cardinality::Many, "code");
        let resource = json!({"base": ["Patient", null, "Group"]});
        let values = base.accessor().values(&resource);
        assert_eq!(values, vec![&json!("Patient"), &json!("Group")]);
    }

    #[test]
    fn test_single_value_and_missing() {
        let code = ChildDefinition::primitive("code", Cardinality::Single, "code");
        assert_eq!(
            code.accessor().first_value(&json!({"code": "identifier"})),
            Some(&json!("identifier"))
        );
        assert!(code.accessor().first_value(&json!({})).is_none());
        assert!(code.accessor().first_value(&json!({"code": null})).is_none());
    }

    #[test]
    fn test_primitive_string() {
        assert_eq!(ChildAccessor::primitive_string(&json!("a")), Some("a".into()));
        assert_eq!(ChildAccessor::primitive_string(&json!(12)), Some("12".into()));
        assert_eq!(ChildAccessor::primitive_string(&json!(true)), Some("true".into()));
        assert_eq!(ChildAccessor::primitive_string(&json!({"x": 1})), None);
    }

    #[test]
    fn test_child_definition_serde() {
        let child: ChildDefinition = serde_json::from_value(json!({
            "name": "member",
            "max": "*",
            "kind": "complex"
        }))
        .unwrap();
        assert!(child.is_repeating());
        assert!(!child.is_primitive());

        let child: ChildDefinition = serde_json::from_value(json!({
            "name": "expression",
            "max": "1",
            "kind": "primitive",
            "type": "string"
        }))
        .unwrap();
        assert_eq!(
            child.kind(),
            &ChildKind::Primitive {
                type_name: "string".into()
            }
        );
    }
}
