//! Core resource storage trait.
//!
//! This module defines the [`ResourceStorage`] trait, which provides the fundamental
//! CRUD operations for FHIR resources, plus lookups by persistent id.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;
use crate::types::{ResourcePid, StoredResource};

/// Core storage trait for FHIR resources.
///
/// This trait defines the fundamental CRUD (Create, Read, Update, Delete) operations
/// for persisting FHIR resources.
///
/// # Versioning
///
/// All mutating operations (create, update, delete) create new versions of resources.
/// The version ID is monotonically increasing. The persistent id (pid) is assigned on
/// first create and never changes.
///
/// # Soft Deletes
///
/// The `delete` operation marks the resource as deleted. Deleted resources are not
/// returned by reads, searches or export listings.
///
/// # Example
///
/// ```ignore
/// use helios_persistence::core::ResourceStorage;
///
/// async fn example<S: ResourceStorage>(storage: &S) -> Result<(), StorageError> {
///     let patient = serde_json::json!({
///         "resourceType": "Patient",
///         "name": [{"family": "Smith"}]
///     });
///     let stored = storage.create("Patient", patient).await?;
///     println!("Created: {} (pid {:?})", stored.url(), stored.pid());
///
///     let read = storage.read("Patient", stored.id()).await?;
///     assert!(read.is_some());
///
///     let mut updated_content = stored.content().clone();
///     updated_content["active"] = serde_json::json!(true);
///     let updated = storage.update(&stored, updated_content).await?;
///     assert_eq!(updated.version_id(), "2");
///     assert_eq!(updated.pid(), stored.pid());
///
///     storage.delete("Patient", stored.id()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait ResourceStorage: Send + Sync {
    /// Returns a human-readable name for this storage backend.
    fn backend_name(&self) -> &'static str;

    /// Creates a new resource.
    ///
    /// A logical id is generated when the content carries none.
    ///
    /// # Errors
    ///
    /// * `StorageError::Validation` - If the resource is invalid
    /// * `StorageError::Resource(AlreadyExists)` - If a resource with the same ID exists
    async fn create(&self, resource_type: &str, resource: Value) -> StorageResult<StoredResource>;

    /// Creates a resource with a specific ID (PUT semantics).
    ///
    /// Returns the stored resource and whether it was newly created.
    async fn create_or_update(
        &self,
        resource_type: &str,
        id: &str,
        resource: Value,
    ) -> StorageResult<(StoredResource, bool)>;

    /// Reads a resource by type and logical ID.
    ///
    /// Returns `None` if the resource does not exist or is deleted.
    async fn read(&self, resource_type: &str, id: &str) -> StorageResult<Option<StoredResource>>;

    /// Reads a resource by type and persistent id.
    async fn read_by_pid(
        &self,
        resource_type: &str,
        pid: ResourcePid,
    ) -> StorageResult<Option<StoredResource>>;

    /// Reads several resources by persistent id.
    ///
    /// Missing or deleted resources are omitted; the order follows `pids`.
    async fn read_by_pids(
        &self,
        resource_type: &str,
        pids: &[ResourcePid],
    ) -> StorageResult<Vec<StoredResource>> {
        let mut results = Vec::with_capacity(pids.len());
        for pid in pids {
            if let Some(resource) = self.read_by_pid(resource_type, *pid).await? {
                results.push(resource);
            }
        }
        Ok(results)
    }

    /// Updates an existing resource.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(NotFound)` - If the resource doesn't exist
    async fn update(&self, current: &StoredResource, resource: Value) -> StorageResult<StoredResource>;

    /// Deletes a resource (soft delete).
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(NotFound)` - If the resource doesn't exist
    /// * `StorageError::Resource(Gone)` - If already deleted
    async fn delete(&self, resource_type: &str, id: &str) -> StorageResult<()>;

    /// Checks if a resource exists.
    async fn exists(&self, resource_type: &str, id: &str) -> StorageResult<bool> {
        Ok(self.read(resource_type, id).await?.is_some())
    }

    /// Counts the non-deleted resources of a type (or of all types).
    async fn count(&self, resource_type: Option<&str>) -> StorageResult<u64>;
}
