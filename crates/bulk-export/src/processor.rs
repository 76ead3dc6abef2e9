//! Loads resources for a page of pids.

use std::sync::Arc;

use async_trait::async_trait;
use helios_batch::{BatchError, BatchResult, ItemProcessor};
use helios_persistence::core::FhirStore;
use helios_persistence::types::StoredResource;

use crate::reader::PidPage;

/// Turns a [`PidPage`] into the stored resources it names.
///
/// Pids whose resources were deleted since they were listed are skipped.
/// A page with no surviving resources is filtered out.
pub struct PidToResourceProcessor {
    store: Arc<dyn FhirStore>,
}

impl PidToResourceProcessor {
    pub fn new(store: Arc<dyn FhirStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl ItemProcessor<PidPage, Vec<StoredResource>> for PidToResourceProcessor {
    async fn process(&self, page: PidPage) -> BatchResult<Option<Vec<StoredResource>>> {
        let resources = self
            .store
            .read_by_pids(&page.resource_type, &page.pids)
            .await
            .map_err(BatchError::process)?;

        tracing::trace!(
            resource_type = %page.resource_type,
            requested = page.pids.len(),
            loaded = resources.len(),
            "Loaded resources for pid page"
        );
        Ok((!resources.is_empty()).then_some(resources))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use helios_persistence::backends::sqlite::SqliteBackend;
    use helios_persistence::core::ResourceStorage;
    use serde_json::json;

    #[tokio::test]
    async fn test_loads_resources_in_page_order() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        let a = backend
            .create("Patient", json!({"resourceType": "Patient", "id": "a"}))
            .await
            .unwrap();
        let b = backend
            .create("Patient", json!({"resourceType": "Patient", "id": "b"}))
            .await
            .unwrap();

        let processor = PidToResourceProcessor::new(Arc::new(backend));
        let page = PidPage {
            resource_type: "Patient".to_string(),
            pids: vec![a.pid().unwrap(), b.pid().unwrap()],
        };

        let resources = processor.process(page).await.unwrap().unwrap();
        let ids: Vec<&str> = resources.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_empty_page_is_filtered() {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();

        let processor = PidToResourceProcessor::new(Arc::new(backend));
        let page = PidPage {
            resource_type: "Patient".to_string(),
            pids: vec![helios_persistence::types::ResourcePid::new(99)],
        };
        assert!(processor.process(page).await.unwrap().is_none());
    }
}
