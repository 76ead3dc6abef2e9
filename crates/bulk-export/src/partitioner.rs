//! Splits an export job into one partition per resource type.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use helios_batch::{BatchError, BatchResult, ExecutionContext, JobScope, Partitioner};
use helios_persistence::core::BulkExportJobStore;
use helios_persistence::error::BulkExportError;

use crate::config::{COLLECTION_ID_KEY, JOB_UUID_PARAMETER, RESOURCE_TYPE_KEY};
use crate::tasklet::job_uuid;

/// One partition per collection of the job entity.
///
/// Each partition context carries `resourceType`,
/// `bulkExportCollectionEntityId` and `jobUUID`.
pub struct ResourceTypePartitioner {
    jobs: Arc<dyn BulkExportJobStore>,
}

impl ResourceTypePartitioner {
    pub fn new(jobs: Arc<dyn BulkExportJobStore>) -> Self {
        Self { jobs }
    }
}

#[async_trait]
impl Partitioner for ResourceTypePartitioner {
    async fn partition(
        &self,
        scope: &JobScope,
        _grid_size: usize,
    ) -> BatchResult<BTreeMap<String, ExecutionContext>> {
        let job_uuid = job_uuid(scope)?;
        let job = self
            .jobs
            .get_job(&job_uuid)
            .await
            .map_err(BatchError::partition)?
            .ok_or_else(|| {
                BatchError::partition(BulkExportError::JobNotFound {
                    job_id: job_uuid.clone(),
                })
            })?;

        let partitions: BTreeMap<String, ExecutionContext> = job
            .collections
            .iter()
            .map(|collection| {
                let mut context = ExecutionContext::new();
                context.put_string(RESOURCE_TYPE_KEY, collection.resource_type.as_str());
                context.put_long(COLLECTION_ID_KEY, collection.id);
                context.put_string(JOB_UUID_PARAMETER, job_uuid.as_str());
                (collection.resource_type.clone(), context)
            })
            .collect();

        tracing::debug!(
            job_uuid = %job_uuid,
            partitions = ?partitions.keys().collect::<Vec<_>>(),
            "Partitioned bulk export job"
        );
        Ok(partitions)
    }
}
