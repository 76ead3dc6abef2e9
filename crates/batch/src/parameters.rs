//! Typed job parameters.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single job parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum JobParameterValue {
    /// Text value.
    String(String),
    /// Integer value.
    Long(i64),
    /// Floating point value.
    Double(f64),
    /// Instant.
    Date(DateTime<Utc>),
}

impl fmt::Display for JobParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobParameterValue::String(s) => write!(f, "{}", s),
            JobParameterValue::Long(v) => write!(f, "{}", v),
            JobParameterValue::Double(v) => write!(f, "{}", v),
            JobParameterValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
        }
    }
}

/// Named parameters passed to a job launch.
///
/// Keys are kept sorted so the rendered form is stable in logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobParameters {
    values: BTreeMap<String, JobParameterValue>,
}

impl JobParameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a string parameter.
    pub fn with_string(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.put(key, JobParameterValue::String(value.into()));
        self
    }

    /// Adds a long parameter.
    pub fn with_long(mut self, key: impl Into<String>, value: i64) -> Self {
        self.put(key, JobParameterValue::Long(value));
        self
    }

    /// Adds a double parameter.
    pub fn with_double(mut self, key: impl Into<String>, value: f64) -> Self {
        self.put(key, JobParameterValue::Double(value));
        self
    }

    /// Adds a date parameter.
    pub fn with_date(mut self, key: impl Into<String>, value: DateTime<Utc>) -> Self {
        self.put(key, JobParameterValue::Date(value));
        self
    }

    /// Inserts or replaces a parameter.
    pub fn put(&mut self, key: impl Into<String>, value: JobParameterValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&JobParameterValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns a string parameter. Other value types are rendered as text.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match self.values.get(key)? {
            JobParameterValue::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Returns a long parameter, parsing string values.
    pub fn get_long(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            JobParameterValue::Long(v) => Some(*v),
            JobParameterValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_double(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            JobParameterValue::Double(v) => Some(*v),
            JobParameterValue::Long(v) => Some(*v as f64),
            JobParameterValue::String(s) => s.trim().parse().ok(),
            JobParameterValue::Date(_) => None,
        }
    }

    /// Returns a date parameter, parsing RFC 3339 strings.
    pub fn get_date(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.values.get(key)? {
            JobParameterValue::Date(d) => Some(*d),
            JobParameterValue::String(s) => DateTime::parse_from_rfc3339(s.trim())
                .ok()
                .map(|d| d.with_timezone(&Utc)),
            _ => None,
        }
    }

    /// Returns a boolean parameter stored as `"true"`/`"false"` or 0/1.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            JobParameterValue::String(s) => s.trim().parse().ok(),
            JobParameterValue::Long(v) => Some(*v != 0),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JobParameterValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl fmt::Display for JobParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (key, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_getters() {
        let since = Utc::now();
        let params = JobParameters::new()
            .with_string("jobUUID", "abc")
            .with_long("readChunkSize", 10)
            .with_string("expandMdm", "true")
            .with_date("since", since);

        assert_eq!(params.get_string("jobUUID").as_deref(), Some("abc"));
        assert_eq!(params.get_long("readChunkSize"), Some(10));
        assert_eq!(params.get_bool("expandMdm"), Some(true));
        assert_eq!(params.get_date("since"), Some(since));
        assert_eq!(params.get_long("missing"), None);
    }

    #[test]
    fn test_string_values_are_parsed() {
        let params = JobParameters::new()
            .with_string("readChunkSize", " 25 ")
            .with_string("since", "2024-01-02T03:04:05Z")
            .with_string("ratio", "0.5");

        assert_eq!(params.get_long("readChunkSize"), Some(25));
        assert_eq!(params.get_double("ratio"), Some(0.5));
        assert_eq!(
            params.get_date("since").unwrap().to_rfc3339(),
            "2024-01-02T03:04:05+00:00"
        );
    }

    #[test]
    fn test_non_numeric_long() {
        let params = JobParameters::new().with_string("readChunkSize", "ten");
        assert_eq!(params.get_long("readChunkSize"), None);
        assert!(params.contains("readChunkSize"));
    }

    #[test]
    fn test_display_is_sorted() {
        let params = JobParameters::new()
            .with_long("b", 2)
            .with_string("a", "x");
        assert_eq!(params.to_string(), "{a=x, b=2}");
    }

    #[test]
    fn test_serde_roundtrip() {
        let params = JobParameters::new().with_long("readChunkSize", 5);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["values"]["readChunkSize"]["type"], "long");
        let back: JobParameters = serde_json::from_value(json).unwrap();
        assert_eq!(back, params);
    }
}
