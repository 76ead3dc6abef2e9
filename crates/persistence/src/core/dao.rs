//! Per-resource-type data access objects.
//!
//! A [`DaoRegistry`] hands out [`ResourceDao`] handles bound to a single
//! resource type. Every handle shares the same underlying [`FhirStore`].

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{ResourceError, StorageResult, ValidationError};
use crate::schema::SchemaRegistry;
use crate::types::{IdType, ResourcePid, SearchQuery, SearchResult, StoredResource};

use super::id_helper::IdHelper;
use super::search::SearchProvider;

/// A store that can search and resolve ids.
pub trait FhirStore: SearchProvider + IdHelper {}

impl<T: SearchProvider + IdHelper + ?Sized> FhirStore for T {}

/// Outcome of a create or update through a DAO.
#[derive(Debug, Clone)]
pub struct DaoMethodOutcome {
    /// The versioned id of the stored resource.
    pub id: IdType,
    /// True if the call created the resource.
    pub created: bool,
    /// The stored resource.
    pub resource: StoredResource,
}

impl DaoMethodOutcome {
    fn new(resource: StoredResource, created: bool) -> Self {
        Self {
            id: resource.id_type(),
            created,
            resource,
        }
    }
}

/// Data access for one resource type.
#[derive(Clone)]
pub struct ResourceDao {
    resource_type: String,
    store: Arc<dyn FhirStore>,
}

impl ResourceDao {
    /// The resource type this DAO serves.
    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    /// Reads a resource by id.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(NotFound)` - If the resource doesn't exist
    /// * `StorageError::Validation(InvalidId)` - If the id names another resource type
    pub async fn read(&self, id: &IdType) -> StorageResult<StoredResource> {
        self.check_id_type(id)?;

        self.store
            .read(&self.resource_type, id.id_part())
            .await?
            .ok_or_else(|| {
                ResourceError::NotFound {
                    resource_type: self.resource_type.clone(),
                    id: id.id_part().to_string(),
                }
                .into()
            })
    }

    /// Reads a resource by persistent id.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(PidNotFound)` - If no live resource has that pid
    pub async fn read_by_pid(&self, pid: ResourcePid) -> StorageResult<StoredResource> {
        self.store
            .read_by_pid(&self.resource_type, pid)
            .await?
            .ok_or_else(|| {
                ResourceError::PidNotFound {
                    resource_type: self.resource_type.clone(),
                    pid: pid.as_i64(),
                }
                .into()
            })
    }

    /// Creates a resource.
    pub async fn create(&self, resource: Value) -> StorageResult<DaoMethodOutcome> {
        self.check_content_type(&resource)?;
        let stored = self.store.create(&self.resource_type, resource).await?;
        Ok(DaoMethodOutcome::new(stored, true))
    }

    /// Updates (or creates) a resource under the id carried in its content.
    ///
    /// # Errors
    ///
    /// * `StorageError::Validation(MissingRequiredField)` - If the content has no `id`
    pub async fn update(&self, resource: Value) -> StorageResult<DaoMethodOutcome> {
        self.check_content_type(&resource)?;

        let id = resource
            .get("id")
            .and_then(Value::as_str)
            .ok_or_else(|| ValidationError::MissingRequiredField {
                field: "id".to_string(),
            })?
            .to_string();

        let (stored, created) = self
            .store
            .create_or_update(&self.resource_type, &id, resource)
            .await?;
        Ok(DaoMethodOutcome::new(stored, created))
    }

    /// Searches this resource type.
    pub async fn search(&self, mut query: SearchQuery) -> StorageResult<SearchResult> {
        query.resource_type = self.resource_type.clone();
        self.store.search(&query).await
    }

    /// Searches this resource type, returning pids only.
    pub async fn search_pids(&self, mut query: SearchQuery) -> StorageResult<Vec<ResourcePid>> {
        query.resource_type = self.resource_type.clone();
        self.store.search_pids(&query).await
    }

    fn check_id_type(&self, id: &IdType) -> StorageResult<()> {
        match id.resource_type() {
            Some(rt) if rt != self.resource_type => Err(ValidationError::InvalidId {
                value: id.to_string(),
            }
            .into()),
            _ => Ok(()),
        }
    }

    fn check_content_type(&self, resource: &Value) -> StorageResult<()> {
        match resource.get("resourceType").and_then(Value::as_str) {
            Some(rt) if rt == self.resource_type => Ok(()),
            Some(rt) => Err(ValidationError::InvalidResource {
                message: format!(
                    "expected a {} resource but got {}",
                    self.resource_type, rt
                ),
            }
            .into()),
            None => Err(ValidationError::MissingRequiredField {
                field: "resourceType".to_string(),
            }
            .into()),
        }
    }
}

impl fmt::Debug for ResourceDao {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDao")
            .field("resource_type", &self.resource_type)
            .field("backend", &self.store.backend_name())
            .finish()
    }
}

/// Hands out DAOs for the resource types the schema registry knows.
#[derive(Clone)]
pub struct DaoRegistry {
    store: Arc<dyn FhirStore>,
    schema: Arc<SchemaRegistry>,
}

impl DaoRegistry {
    /// Creates a registry over a store.
    pub fn new(store: Arc<dyn FhirStore>, schema: Arc<SchemaRegistry>) -> Self {
        Self { store, schema }
    }

    /// Returns true if DAOs can be created for the type.
    pub fn is_resource_type_supported(&self, resource_type: &str) -> bool {
        self.schema.contains(resource_type)
    }

    /// Returns the DAO for a resource type.
    ///
    /// # Errors
    ///
    /// * `StorageError::Validation(UnsupportedResourceType)` - If the type is unknown
    pub fn get_resource_dao(&self, resource_type: &str) -> StorageResult<ResourceDao> {
        if !self.is_resource_type_supported(resource_type) {
            return Err(ValidationError::UnsupportedResourceType {
                resource_type: resource_type.to_string(),
            }
            .into());
        }

        Ok(ResourceDao {
            resource_type: resource_type.to_string(),
            store: Arc::clone(&self.store),
        })
    }

    /// The shared store.
    pub fn store(&self) -> &Arc<dyn FhirStore> {
        &self.store
    }

    /// The schema registry.
    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }
}

impl fmt::Debug for DaoRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaoRegistry")
            .field("backend", &self.store.backend_name())
            .field("resource_types", &self.schema.resource_types())
            .finish()
    }
}
