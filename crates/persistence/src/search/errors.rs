//! Errors raised while loading SearchParameters, registering them, and
//! extracting index values from resources.

#![allow(missing_docs)]

use thiserror::Error;

use crate::schema::SchemaError;

/// A SearchParameter definition could not be loaded.
#[derive(Error, Debug, Clone)]
pub enum LoaderError {
    #[error("Invalid SearchParameter{}: {message}", quoted(.url))]
    InvalidResource { message: String, url: Option<String> },

    #[error("SearchParameter{} missing required field '{field}'", quoted(.url))]
    MissingField { field: String, url: Option<String> },

    #[error("Failed to load embedded {version} parameters: {message}")]
    EmbeddedLoadFailed { version: String, message: String },
}

impl From<SchemaError> for LoaderError {
    fn from(err: SchemaError) -> Self {
        LoaderError::InvalidResource {
            message: err.to_string(),
            url: None,
        }
    }
}

fn quoted(url: &Option<String>) -> String {
    url.as_deref()
        .map(|url| format!(" '{}'", url))
        .unwrap_or_default()
}

/// A definition conflicts with one already registered.
#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("SearchParameter with URL '{url}' already exists")]
    DuplicateUrl { url: String },
}

/// A resource could not be indexed.
#[derive(Error, Debug, Clone)]
pub enum ExtractionError {
    #[error("Invalid resource for extraction: {message}")]
    InvalidResource { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loader_error_display() {
        let err = LoaderError::MissingField {
            field: "code".to_string(),
            url: Some("http://example.org/sp".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "SearchParameter 'http://example.org/sp' missing required field 'code'"
        );

        let err = LoaderError::InvalidResource {
            message: "bad type".to_string(),
            url: None,
        };
        assert_eq!(err.to_string(), "Invalid SearchParameter: bad type");
    }

    #[test]
    fn test_schema_error_converts() {
        let err: LoaderError = SchemaError::UnknownResourceType {
            resource_type: "Foo".to_string(),
        }
        .into();
        assert!(err.to_string().contains("unknown resource type: Foo"));
    }
}
