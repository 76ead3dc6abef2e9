//! Writes processed chunks as NDJSON files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use helios_batch::{BatchError, BatchResult, ExecutionContext, ItemWriter, JobScope};
use helios_persistence::core::BulkExportJobStore;
use helios_persistence::types::StoredResource;
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::config::{COLLECTION_ID_KEY, JOB_UUID_PARAMETER, RESOURCE_TYPE_KEY};

/// Writes every chunk to its own file and records it on the collection.
///
/// Files land in `<output_dir>/<jobUUID>/<ResourceType>-<n>.ndjson`, with
/// `n` counting from 1 within a partition.
pub struct ResourceToFileWriter {
    jobs: Arc<dyn BulkExportJobStore>,
    job_dir: PathBuf,
    resource_type: String,
    collection_id: i64,
    file_index: usize,
}

impl ResourceToFileWriter {
    pub fn new(
        jobs: Arc<dyn BulkExportJobStore>,
        output_dir: &Path,
        job_uuid: &str,
        resource_type: impl Into<String>,
        collection_id: i64,
    ) -> Self {
        Self {
            jobs,
            job_dir: output_dir.join(job_uuid),
            resource_type: resource_type.into(),
            collection_id,
            file_index: 0,
        }
    }

    /// Builds a writer from a partition's execution context.
    pub fn from_context(
        jobs: &Arc<dyn BulkExportJobStore>,
        output_dir: &Path,
        scope: &JobScope,
        context: &ExecutionContext,
    ) -> BatchResult<Self> {
        let job_uuid = match context.get_string(JOB_UUID_PARAMETER) {
            Some(uuid) => uuid.to_string(),
            None => crate::tasklet::job_uuid(scope)?,
        };
        Ok(Self::new(
            Arc::clone(jobs),
            output_dir,
            &job_uuid,
            context.require_string(RESOURCE_TYPE_KEY)?,
            context.require_long(COLLECTION_ID_KEY)?,
        ))
    }

    async fn write_file(&self, path: &Path, resources: &[StoredResource]) -> std::io::Result<()> {
        fs::create_dir_all(&self.job_dir).await?;
        let file = fs::File::create(path).await?;
        let mut out = BufWriter::new(file);
        for resource in resources {
            let line = serde_json::to_vec(resource.content())?;
            out.write_all(&line).await?;
            out.write_all(b"\n").await?;
        }
        out.flush().await
    }
}

#[async_trait]
impl ItemWriter<Vec<StoredResource>> for ResourceToFileWriter {
    async fn write(&mut self, items: Vec<Vec<StoredResource>>) -> BatchResult<()> {
        let resources: Vec<StoredResource> = items.into_iter().flatten().collect();
        if resources.is_empty() {
            return Ok(());
        }

        self.file_index += 1;
        let path = self
            .job_dir
            .join(format!("{}-{}.ndjson", self.resource_type, self.file_index));

        self.write_file(&path, &resources)
            .await
            .map_err(BatchError::write)?;

        let count = resources.len() as u64;
        let file_url = path.to_string_lossy();
        self.jobs
            .add_collection_file(self.collection_id, &file_url, count)
            .await
            .map_err(BatchError::write)?;

        tracing::debug!(
            resource_type = %self.resource_type,
            file = %file_url,
            count,
            "Wrote bulk export file"
        );
        Ok(())
    }
}
