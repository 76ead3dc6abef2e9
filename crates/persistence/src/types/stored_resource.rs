//! Resources as they come back from storage.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::{IdType, ResourcePid};

/// User-data key under which a loaded resource carries its persistent id.
pub const RESOURCE_PID_KEY: &str = "RESOURCE_PID";

/// Transient key/value data attached to an in-memory resource.
///
/// Not serialized. Storage backends populate [`RESOURCE_PID_KEY`] when they
/// load a resource so later lookups can skip the id-to-pid resolution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserData(HashMap<String, Value>);

impl UserData {
    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.0.insert(key.into(), value);
    }

    /// Removes and returns the value under `key`.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A resource's JSON content plus the identity and timestamps the store
/// keeps for it.
///
/// ```
/// use helios_persistence::types::StoredResource;
/// use serde_json::json;
///
/// let resource = StoredResource::new("Group", "g1", json!({"resourceType": "Group", "id": "g1"}));
///
/// assert_eq!(resource.url(), "Group/g1");
/// assert_eq!(resource.version_id(), "1");
/// assert!(resource.pid().is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredResource {
    resource_type: String,
    id: String,
    /// Set once the resource has a row in storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pid: Option<ResourcePid>,
    version_id: String,
    content: Value,
    created_at: DateTime<Utc>,
    last_modified: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    user_data: UserData,
}

impl StoredResource {
    /// A first version that has not been stored yet.
    pub fn new(resource_type: impl Into<String>, id: impl Into<String>, content: Value) -> Self {
        let now = Utc::now();
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            pid: None,
            version_id: "1".to_string(),
            content,
            created_at: now,
            last_modified: now,
            deleted_at: None,
            user_data: UserData::default(),
        }
    }

    /// Builds a resource from a loaded row. The pid is recorded both on the
    /// resource and in user data under [`RESOURCE_PID_KEY`].
    #[allow(clippy::too_many_arguments)]
    pub fn from_storage(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        pid: ResourcePid,
        version_id: impl Into<String>,
        content: Value,
        created_at: DateTime<Utc>,
        last_modified: DateTime<Utc>,
        deleted_at: Option<DateTime<Utc>>,
    ) -> Self {
        let mut user_data = UserData::default();
        user_data.set(RESOURCE_PID_KEY, Value::from(pid.as_i64()));

        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            pid: Some(pid),
            version_id: version_id.into(),
            content,
            created_at,
            last_modified,
            deleted_at,
            user_data,
        }
    }

    /// The resource type, e.g. `Patient`.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// The logical id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Typed, versioned id, e.g. `Person/p1/_history/3`.
    pub fn id_type(&self) -> IdType {
        IdType::new(&self.resource_type, &self.id).with_version(&self.version_id)
    }

    /// The persistent id, if stored.
    pub fn pid(&self) -> Option<ResourcePid> {
        self.pid
    }

    /// The current version id.
    pub fn version_id(&self) -> &str {
        &self.version_id
    }

    /// The resource JSON.
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// When the first version was stored.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the current version was stored.
    pub fn last_modified(&self) -> DateTime<Utc> {
        self.last_modified
    }

    /// When the resource was deleted, if it was.
    pub fn deleted_at(&self) -> Option<DateTime<Utc>> {
        self.deleted_at
    }

    /// Returns true if the resource has been deleted.
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Transient annotations.
    pub fn user_data(&self) -> &UserData {
        &self.user_data
    }

    /// Transient annotations, for modification.
    pub fn user_data_mut(&mut self) -> &mut UserData {
        &mut self.user_data
    }

    /// Relative reference to this resource, e.g. `Patient/123`.
    pub fn url(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_new_resource_is_unstored() {
        let resource = StoredResource::new("Patient", "123", json!({"resourceType": "Patient"}));

        assert!(resource.pid().is_none());
        assert!(resource.user_data().is_empty());
        assert!(!resource.is_deleted());
        assert_eq!(resource.created_at(), resource.last_modified());
    }

    #[test]
    fn test_from_storage_sets_pid_user_data() {
        let now = Utc::now();
        let resource = StoredResource::from_storage(
            "Person",
            "p1",
            ResourcePid::new(7),
            "3",
            json!({}),
            now,
            now,
            None,
        );

        assert_eq!(resource.pid(), Some(ResourcePid::new(7)));
        assert_eq!(resource.user_data().get(RESOURCE_PID_KEY), Some(&json!(7)));
        assert_eq!(resource.id_type().to_string(), "Person/p1/_history/3");
    }

    #[test]
    fn test_user_data_is_not_serialized() {
        let mut resource = StoredResource::new("Patient", "123", json!({"resourceType": "Patient"}));
        resource.user_data_mut().set("note", json!("transient"));

        let json = serde_json::to_string(&resource).unwrap();
        assert!(!json.contains("transient"));

        let parsed: StoredResource = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id(), "123");
        assert!(parsed.user_data().is_empty());
    }
}
