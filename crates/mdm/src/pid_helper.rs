//! Persistent id lookup with per-resource caching.

use std::sync::Arc;

use helios_persistence::core::IdHelper;
use helios_persistence::error::StorageResult;
use helios_persistence::types::{RESOURCE_PID_KEY, ResourcePid, StoredResource};
use serde_json::Value;

/// Resolves the pid of an in-memory resource.
#[derive(Clone)]
pub struct ResourcePidHelper {
    id_helper: Arc<dyn IdHelper>,
}

impl ResourcePidHelper {
    pub fn new(id_helper: Arc<dyn IdHelper>) -> Self {
        Self { id_helper }
    }

    /// Returns the pid of `resource`, or `None` if it is not stored.
    ///
    /// A pid cached in the resource's user data under `RESOURCE_PID` is
    /// returned as is. Otherwise the pid is resolved from the resource type
    /// and logical id and cached on the resource. Errors other than
    /// not-found propagate.
    pub async fn get_pid_or_none(
        &self,
        resource: &mut StoredResource,
    ) -> StorageResult<Option<ResourcePid>> {
        if let Some(pid) = resource
            .user_data()
            .get(RESOURCE_PID_KEY)
            .and_then(Value::as_i64)
        {
            return Ok(Some(ResourcePid::new(pid)));
        }

        match self
            .id_helper
            .resolve_resource_pid(resource.resource_type(), resource.id())
            .await
        {
            Ok(pid) => {
                resource
                    .user_data_mut()
                    .set(RESOURCE_PID_KEY, Value::from(pid.as_i64()));
                Ok(Some(pid))
            }
            Err(e) if e.is_not_found() => {
                tracing::debug!(
                    resource_type = %resource.resource_type(),
                    id = %resource.id(),
                    "No pid for resource"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

impl std::fmt::Debug for ResourcePidHelper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourcePidHelper").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use helios_persistence::error::{BackendError, ResourceError, StorageError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Resolves `Patient/known` to pid 42 and counts calls.
    #[derive(Default)]
    struct CountingIdHelper {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl IdHelper for CountingIdHelper {
        async fn resolve_resource_pid(
            &self,
            resource_type: &str,
            id: &str,
        ) -> StorageResult<ResourcePid> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match id {
                "known" => Ok(ResourcePid::new(42)),
                "broken" => Err(StorageError::Backend(BackendError::ConnectionFailed {
                    backend_name: "test".to_string(),
                    message: "down".to_string(),
                })),
                _ => Err(ResourceError::NotFound {
                    resource_type: resource_type.to_string(),
                    id: id.to_string(),
                }
                .into()),
            }
        }
    }

    fn patient(id: &str) -> StoredResource {
        StoredResource::new("Patient", id, json!({"resourceType": "Patient", "id": id}))
    }

    #[tokio::test]
    async fn test_resolved_pid_is_cached() {
        let id_helper = Arc::new(CountingIdHelper::default());
        let helper = ResourcePidHelper::new(id_helper.clone());
        let mut resource = patient("known");

        let first = helper.get_pid_or_none(&mut resource).await.unwrap();
        let second = helper.get_pid_or_none(&mut resource).await.unwrap();

        assert_eq!(first, Some(ResourcePid::new(42)));
        assert_eq!(second, first);
        assert_eq!(id_helper.calls.load(Ordering::SeqCst), 1);
        assert_eq!(resource.user_data().get(RESOURCE_PID_KEY), Some(&json!(42)));
    }

    #[tokio::test]
    async fn test_preset_user_data_skips_resolution() {
        let id_helper = Arc::new(CountingIdHelper::default());
        let helper = ResourcePidHelper::new(id_helper.clone());
        let mut resource = patient("unknown");
        resource.user_data_mut().set(RESOURCE_PID_KEY, json!(7));

        let pid = helper.get_pid_or_none(&mut resource).await.unwrap();

        assert_eq!(pid, Some(ResourcePid::new(7)));
        assert_eq!(id_helper.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_none() {
        let helper = ResourcePidHelper::new(Arc::new(CountingIdHelper::default()));
        let mut resource = patient("unknown");

        assert_eq!(helper.get_pid_or_none(&mut resource).await.unwrap(), None);
        assert!(resource.user_data().get(RESOURCE_PID_KEY).is_none());
    }

    #[tokio::test]
    async fn test_other_errors_propagate() {
        let helper = ResourcePidHelper::new(Arc::new(CountingIdHelper::default()));
        let mut resource = patient("broken");

        let err = helper.get_pid_or_none(&mut resource).await.unwrap_err();
        assert!(matches!(err, StorageError::Backend(_)));
    }
}
