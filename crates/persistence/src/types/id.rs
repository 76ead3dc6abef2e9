//! Resource identifier types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Persistent numeric identifier of a stored resource row.
///
/// Assigned by the store when a resource is first created and stable across
/// updates. Distinct from the logical id, which is client-visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourcePid(i64);

impl ResourcePid {
    /// Wraps a raw pid.
    pub fn new(pid: i64) -> Self {
        Self(pid)
    }

    /// Returns the pid as an `i64`.
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for ResourcePid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for ResourcePid {
    fn from(pid: i64) -> Self {
        Self(pid)
    }
}

/// A parsed FHIR resource id: `[Type/]id[/_history/version]`.
///
/// # Examples
///
/// ```
/// use helios_persistence::types::IdType;
///
/// let id: IdType = "Patient/123/_history/2".parse().unwrap();
/// assert_eq!(id.resource_type(), Some("Patient"));
/// assert_eq!(id.id_part(), "123");
/// assert_eq!(id.version_id_part(), Some("2"));
/// assert_eq!(id.to_unqualified_versionless().to_string(), "Patient/123");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdType {
    resource_type: Option<String>,
    id_part: String,
    version_id_part: Option<String>,
}

impl IdType {
    /// Creates a typed id.
    pub fn new(resource_type: impl Into<String>, id_part: impl Into<String>) -> Self {
        Self {
            resource_type: Some(resource_type.into()),
            id_part: id_part.into(),
            version_id_part: None,
        }
    }

    /// Creates an id without a resource type.
    pub fn of_id(id_part: impl Into<String>) -> Self {
        Self {
            resource_type: None,
            id_part: id_part.into(),
            version_id_part: None,
        }
    }

    /// Sets the version part.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version_id_part = Some(version.into());
        self
    }

    /// Returns the resource type, if the id is qualified with one.
    pub fn resource_type(&self) -> Option<&str> {
        self.resource_type.as_deref()
    }

    /// Returns the logical id part.
    pub fn id_part(&self) -> &str {
        &self.id_part
    }

    /// Returns the version part, if any.
    pub fn version_id_part(&self) -> Option<&str> {
        self.version_id_part.as_deref()
    }

    /// Returns true if a resource type is present.
    pub fn has_resource_type(&self) -> bool {
        self.resource_type.is_some()
    }

    /// Drops the version part.
    pub fn to_unqualified_versionless(&self) -> Self {
        Self {
            resource_type: self.resource_type.clone(),
            id_part: self.id_part.clone(),
            version_id_part: None,
        }
    }
}

impl fmt::Display for IdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(rt) = &self.resource_type {
            write!(f, "{}/", rt)?;
        }
        write!(f, "{}", self.id_part)?;
        if let Some(v) = &self.version_id_part {
            write!(f, "/_history/{}", v)?;
        }
        Ok(())
    }
}

impl FromStr for IdType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ValidationError::InvalidId {
            value: s.to_string(),
        };

        let parts: Vec<&str> = s.trim_matches('/').split('/').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        match parts.as_slice() {
            [id] => Ok(Self::of_id(*id)),
            [rt, id] => Ok(Self::new(*rt, *id)),
            [rt, id, "_history", version] => Ok(Self::new(*rt, *id).with_version(*version)),
            _ => Err(invalid()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_unqualified_id() {
        let id: IdType = "abc".parse().unwrap();
        assert_eq!(id.resource_type(), None);
        assert_eq!(id.id_part(), "abc");
        assert!(!id.has_resource_type());
    }

    #[test]
    fn test_parse_typed_id() {
        let id: IdType = "Person/p-1".parse().unwrap();
        assert_eq!(id.resource_type(), Some("Person"));
        assert_eq!(id.id_part(), "p-1");
        assert_eq!(id.version_id_part(), None);
        assert_eq!(id.to_string(), "Person/p-1");
    }

    #[test]
    fn test_parse_versioned_id() {
        let id: IdType = "Patient/1/_history/3".parse().unwrap();
        assert_eq!(id.version_id_part(), Some("3"));
        assert_eq!(id.to_string(), "Patient/1/_history/3");
    }

    #[test]
    fn test_parse_invalid_id() {
        assert!("Patient//1".parse::<IdType>().is_err());
        assert!("Patient/1/history/2".parse::<IdType>().is_err());
        assert!("".parse::<IdType>().is_err());
    }

    #[test]
    fn test_resource_pid() {
        let pid = ResourcePid::new(42);
        assert_eq!(pid.as_i64(), 42);
        assert_eq!(pid.to_string(), "42");
        assert!(ResourcePid::from(1) < ResourcePid::from(2));
    }
}
