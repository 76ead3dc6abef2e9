//! Dependencies shared by the export job components.

use std::sync::Arc;

use helios_mdm::MdmLinkExpansionSvc;
use helios_persistence::backends::sqlite::SqliteBackend;
use helios_persistence::core::{BulkExportJobStore, ExportPidProvider, FhirStore};

use crate::config::BulkExportSettings;
use crate::error::ExportResult;

/// Everything the tasklets, readers and writers of an export job use.
#[derive(Clone)]
pub struct ExportServices {
    pub store: Arc<dyn FhirStore>,
    pub jobs: Arc<dyn BulkExportJobStore>,
    pub pids: Arc<dyn ExportPidProvider>,
    /// Present when group exports may expand members through MDM links.
    pub link_expansion: Option<Arc<MdmLinkExpansionSvc>>,
    pub settings: BulkExportSettings,
}

impl ExportServices {
    pub fn new(
        store: Arc<dyn FhirStore>,
        jobs: Arc<dyn BulkExportJobStore>,
        pids: Arc<dyn ExportPidProvider>,
        settings: BulkExportSettings,
    ) -> Self {
        Self {
            store,
            jobs,
            pids,
            link_expansion: None,
            settings,
        }
    }

    pub fn with_link_expansion(mut self, svc: Arc<MdmLinkExpansionSvc>) -> Self {
        self.link_expansion = Some(svc);
        self
    }

    /// Wires every service to one SQLite backend, MDM expansion included.
    pub fn for_sqlite(
        backend: &Arc<SqliteBackend>,
        settings: BulkExportSettings,
    ) -> ExportResult<Self> {
        let expansion = MdmLinkExpansionSvc::new(&backend.dao_registry())?;
        let store: Arc<dyn FhirStore> = backend.clone();
        let jobs: Arc<dyn BulkExportJobStore> = backend.clone();
        let pids: Arc<dyn ExportPidProvider> = backend.clone();

        Ok(Self::new(store, jobs, pids, settings).with_link_expansion(Arc::new(expansion)))
    }
}

impl std::fmt::Debug for ExportServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportServices")
            .field("backend", &self.store.backend_name())
            .field("link_expansion", &self.link_expansion.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}
