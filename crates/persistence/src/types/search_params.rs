//! FHIR search parameter types.
//!
//! This module defines the small search model used by the DAO layer:
//! parameter types as declared by SearchParameter resources, typed search
//! values and a query that ANDs parameters together.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::stored_resource::StoredResource;

/// FHIR search parameter types.
///
/// See: https://build.fhir.org/search.html#ptypes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamType {
    /// A simple string, like a name or description.
    String,
    /// A search against a URI.
    Uri,
    /// A search for a number.
    Number,
    /// A search for a date, dateTime, or period.
    Date,
    /// A quantity, with a number and units.
    Quantity,
    /// A code from a code system or value set.
    Token,
    /// A reference to another resource.
    Reference,
    /// A composite search parameter that combines others.
    Composite,
    /// Special search parameters (_id, _lastUpdated, etc.).
    Special,
}

impl fmt::Display for SearchParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchParamType::String => write!(f, "string"),
            SearchParamType::Uri => write!(f, "uri"),
            SearchParamType::Number => write!(f, "number"),
            SearchParamType::Date => write!(f, "date"),
            SearchParamType::Quantity => write!(f, "quantity"),
            SearchParamType::Token => write!(f, "token"),
            SearchParamType::Reference => write!(f, "reference"),
            SearchParamType::Composite => write!(f, "composite"),
            SearchParamType::Special => write!(f, "special"),
        }
    }
}

impl FromStr for SearchParamType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "string" => Ok(SearchParamType::String),
            "uri" => Ok(SearchParamType::Uri),
            "number" => Ok(SearchParamType::Number),
            "date" => Ok(SearchParamType::Date),
            "quantity" => Ok(SearchParamType::Quantity),
            "token" => Ok(SearchParamType::Token),
            "reference" => Ok(SearchParamType::Reference),
            "composite" => Ok(SearchParamType::Composite),
            "special" => Ok(SearchParamType::Special),
            _ => Err(format!("unknown search parameter type: {}", s)),
        }
    }
}

/// A single typed search value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SearchValue {
    /// `[system|]code`. A missing system matches any system.
    Token {
        /// The code system, if constrained.
        system: Option<String>,
        /// The code.
        code: String,
    },
    /// A resource reference such as `Patient/123`.
    Reference {
        /// The reference string.
        reference: String,
    },
    /// A case-insensitive prefix match on a string element.
    String {
        /// The string to match.
        value: String,
    },
}

impl SearchValue {
    /// Creates a token value constrained to `system`.
    pub fn token(system: impl Into<String>, code: impl Into<String>) -> Self {
        SearchValue::Token {
            system: Some(system.into()),
            code: code.into(),
        }
    }

    /// Creates a token value matching `code` in any system.
    pub fn code(code: impl Into<String>) -> Self {
        SearchValue::Token {
            system: None,
            code: code.into(),
        }
    }

    /// Creates a reference value.
    pub fn reference(reference: impl Into<String>) -> Self {
        SearchValue::Reference {
            reference: reference.into(),
        }
    }

    /// Creates a string value.
    pub fn string(value: impl Into<String>) -> Self {
        SearchValue::String {
            value: value.into(),
        }
    }

    /// Returns true if this value may be used with a parameter of `param_type`.
    pub fn is_valid_for(&self, param_type: SearchParamType) -> bool {
        match self {
            SearchValue::Token { .. } => param_type == SearchParamType::Token,
            SearchValue::Reference { .. } => param_type == SearchParamType::Reference,
            SearchValue::String { .. } => {
                matches!(param_type, SearchParamType::String | SearchParamType::Uri)
            }
        }
    }
}

/// A search parameter with its values. Multiple values are ORed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchParameter {
    /// The parameter name (e.g., "identifier").
    pub name: String,

    /// The search value(s).
    pub values: Vec<SearchValue>,
}

/// A complete search query. Parameters are ANDed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// The resource type being searched.
    pub resource_type: String,

    /// Search parameters.
    pub parameters: Vec<SearchParameter>,

    /// Result count limit (_count).
    pub count: Option<u32>,

    /// Load every match before returning rather than paging lazily.
    pub synchronous: bool,
}

impl SearchQuery {
    /// Creates a new search query for the given resource type.
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            ..Default::default()
        }
    }

    /// Adds a search parameter.
    pub fn with_parameter(mut self, param: SearchParameter) -> Self {
        self.parameters.push(param);
        self
    }

    /// Adds a single-valued parameter.
    pub fn with_value(self, name: impl Into<String>, value: SearchValue) -> Self {
        self.with_parameter(SearchParameter {
            name: name.into(),
            values: vec![value],
        })
    }

    /// Sets the count limit.
    pub fn with_count(mut self, count: u32) -> Self {
        self.count = Some(count);
        self
    }

    /// Marks the query as synchronous.
    pub fn load_synchronous(mut self) -> Self {
        self.synchronous = true;
        self
    }
}

/// The matches of a search, ordered by pid.
#[derive(Debug, Clone, Default)]
pub struct SearchResult {
    /// Matching resources.
    pub resources: Vec<StoredResource>,
}

impl SearchResult {
    /// Returns the first match, if any.
    pub fn first(&self) -> Option<&StoredResource> {
        self.resources.first()
    }

    /// Consumes the result and returns the first match.
    pub fn into_first(self) -> Option<StoredResource> {
        self.resources.into_iter().next()
    }

    /// Number of matches.
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Returns true if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}
