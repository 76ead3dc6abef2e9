//! Logical id to persistent id resolution.

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::types::ResourcePid;

/// Resolves logical resource ids to persistent ids.
#[async_trait]
pub trait IdHelper: Send + Sync {
    /// Returns the pid of `resource_type/id`.
    ///
    /// # Errors
    ///
    /// * `StorageError::Resource(NotFound)` - If no live resource has that id
    async fn resolve_resource_pid(&self, resource_type: &str, id: &str) -> StorageResult<ResourcePid>;

    /// Resolves several ids of one type. Unknown ids are skipped.
    async fn resolve_resource_pids(
        &self,
        resource_type: &str,
        ids: &[String],
    ) -> StorageResult<Vec<ResourcePid>> {
        let mut pids = Vec::with_capacity(ids.len());
        for id in ids {
            match self.resolve_resource_pid(resource_type, id).await {
                Ok(pid) => pids.push(pid),
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(pids)
    }
}
