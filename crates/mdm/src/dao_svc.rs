//! Resource access used by MDM matching.

use std::sync::Arc;

use helios_persistence::core::{DaoMethodOutcome, DaoRegistry, ResourceDao};
use helios_persistence::error::StorageResult;
use helios_persistence::types::{IdType, ResourcePid, SearchQuery, SearchValue, StoredResource};
use serde_json::Value;

use crate::error::MdmResult;
use crate::settings::MdmSettings;

/// Reads and updates the resource types MDM works with.
///
/// The Patient, Person and Practitioner DAOs are looked up once, when the
/// service is created.
#[derive(Debug, Clone)]
pub struct MdmResourceDaoSvc {
    settings: Arc<MdmSettings>,
    patient_dao: ResourceDao,
    person_dao: ResourceDao,
    practitioner_dao: ResourceDao,
}

impl MdmResourceDaoSvc {
    /// Creates the service.
    ///
    /// # Errors
    ///
    /// Fails if the registry does not support one of the three types.
    pub fn new(daos: &DaoRegistry, settings: Arc<MdmSettings>) -> MdmResult<Self> {
        Ok(Self {
            settings,
            patient_dao: daos.get_resource_dao("Patient")?,
            person_dao: daos.get_resource_dao("Person")?,
            practitioner_dao: daos.get_resource_dao("Practitioner")?,
        })
    }

    pub async fn read_patient(&self, id: &IdType) -> StorageResult<StoredResource> {
        self.patient_dao.read(id).await
    }

    pub async fn read_person(&self, id: &IdType) -> StorageResult<StoredResource> {
        self.person_dao.read(id).await
    }

    pub async fn read_practitioner(&self, id: &IdType) -> StorageResult<StoredResource> {
        self.practitioner_dao.read(id).await
    }

    /// Creates or updates a Person by its id.
    pub async fn update_person(&self, person: Value) -> StorageResult<DaoMethodOutcome> {
        self.person_dao.update(person).await
    }

    pub async fn read_person_by_pid(&self, pid: ResourcePid) -> StorageResult<StoredResource> {
        self.person_dao.read_by_pid(pid).await
    }

    /// Finds the Person carrying an enterprise id.
    ///
    /// Searches `Person.identifier` with the configured EID system. Returns
    /// `None` when nothing matches and the first match otherwise.
    pub async fn search_person_by_eid(&self, eid: &str) -> StorageResult<Option<StoredResource>> {
        let query = SearchQuery::new("Person")
            .with_value(
                "identifier",
                SearchValue::token(self.settings.enterprise_eid_system(), eid),
            )
            .load_synchronous();

        let result = self.person_dao.search(query).await?;
        if result.len() > 1 {
            tracing::warn!(
                eid = %eid,
                matches = result.len(),
                "More than one Person carries the same EID"
            );
        }
        Ok(result.into_first())
    }

    pub fn settings(&self) -> &MdmSettings {
        &self.settings
    }
}
