//! MDM services against an in-memory SQLite store.

use std::sync::Arc;

use serde_json::{Value, json};

use helios_mdm::{MdmLinkExpansionSvc, MdmResourceDaoSvc, MdmSettings, ResourcePidHelper};
use helios_persistence::backends::sqlite::SqliteBackend;
use helios_persistence::core::{DaoRegistry, IdHelper, ResourceStorage};
use helios_persistence::types::{IdType, StoredResource};

const EID_SYSTEM: &str = "http://example.org/enterprise-id";

fn backend() -> Arc<SqliteBackend> {
    let backend = SqliteBackend::in_memory().unwrap();
    backend.init_schema().unwrap();
    Arc::new(backend)
}

fn person(id: &str, eid: Option<&str>, patients: &[&str]) -> Value {
    let mut person = json!({"resourceType": "Person", "id": id});
    if let Some(eid) = eid {
        person["identifier"] = json!([{"system": EID_SYSTEM, "value": eid}]);
    }
    person["link"] = json!(
        patients
            .iter()
            .map(|p| json!({"target": {"reference": format!("Patient/{}", p)}}))
            .collect::<Vec<_>>()
    );
    person
}

fn patient(id: &str) -> Value {
    json!({"resourceType": "Patient", "id": id, "name": [{"family": "Doe"}]})
}

fn dao_svc(daos: &DaoRegistry) -> MdmResourceDaoSvc {
    MdmResourceDaoSvc::new(daos, Arc::new(MdmSettings::new(EID_SYSTEM))).unwrap()
}

#[tokio::test]
async fn test_search_person_by_eid() {
    let backend = backend();
    let svc = dao_svc(&backend.dao_registry());

    assert!(svc.search_person_by_eid("E-1").await.unwrap().is_none());

    backend
        .create("Person", person("per-1", Some("E-1"), &[]))
        .await
        .unwrap();
    backend
        .create("Person", person("per-2", Some("E-1"), &[]))
        .await
        .unwrap();
    backend
        .create("Person", person("per-3", Some("E-3"), &[]))
        .await
        .unwrap();

    let found = svc.search_person_by_eid("E-1").await.unwrap().unwrap();
    assert_eq!(found.id(), "per-1");

    let found = svc.search_person_by_eid("E-3").await.unwrap().unwrap();
    assert_eq!(found.id(), "per-3");
}

#[tokio::test]
async fn test_eid_search_ignores_other_systems() {
    let backend = backend();
    let svc = dao_svc(&backend.dao_registry());

    backend
        .create(
            "Person",
            json!({
                "resourceType": "Person",
                "id": "per-1",
                "identifier": [{"system": "http://hospital.org/mrn", "value": "E-1"}]
            }),
        )
        .await
        .unwrap();

    assert!(svc.search_person_by_eid("E-1").await.unwrap().is_none());
}

#[tokio::test]
async fn test_reads_and_person_update() {
    let backend = backend();
    let svc = dao_svc(&backend.dao_registry());

    backend.create("Patient", patient("pat-1")).await.unwrap();
    backend
        .create(
            "Practitioner",
            json!({"resourceType": "Practitioner", "id": "doc-1"}),
        )
        .await
        .unwrap();

    let created = svc
        .update_person(person("per-1", Some("E-1"), &["pat-1"]))
        .await
        .unwrap();
    assert!(created.created);

    let updated = svc
        .update_person(person("per-1", Some("E-2"), &["pat-1"]))
        .await
        .unwrap();
    assert!(!updated.created);
    assert_eq!(updated.id.version_id_part(), Some("2"));

    let by_pid = svc
        .read_person_by_pid(updated.resource.pid().unwrap())
        .await
        .unwrap();
    assert_eq!(by_pid.content()["identifier"][0]["value"], "E-2");

    assert_eq!(
        svc.read_patient(&IdType::new("Patient", "pat-1"))
            .await
            .unwrap()
            .id(),
        "pat-1"
    );
    assert_eq!(
        svc.read_practitioner(&IdType::of_id("doc-1"))
            .await
            .unwrap()
            .id(),
        "doc-1"
    );
    assert!(
        svc.read_person(&IdType::of_id("per-9"))
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_pid_helper_against_store() {
    let backend = backend();
    let stored = backend.create("Patient", patient("pat-1")).await.unwrap();
    let id_helper: Arc<dyn IdHelper> = backend.clone();
    let helper = ResourcePidHelper::new(id_helper);

    // A freshly built resource has no cached pid and gets one resolved.
    let mut fresh = StoredResource::new("Patient", "pat-1", patient("pat-1"));
    assert_eq!(helper.get_pid_or_none(&mut fresh).await.unwrap(), stored.pid());

    let mut missing = StoredResource::new("Patient", "pat-404", patient("pat-404"));
    assert_eq!(helper.get_pid_or_none(&mut missing).await.unwrap(), None);
}

#[tokio::test]
async fn test_link_expansion() {
    let backend = backend();
    for id in ["pat-1", "pat-2", "pat-3", "pat-4"] {
        backend.create("Patient", patient(id)).await.unwrap();
    }
    backend
        .create("Person", person("per-1", Some("E-1"), &["pat-1", "pat-2"]))
        .await
        .unwrap();
    backend
        .create("Person", person("per-2", Some("E-2"), &["pat-3"]))
        .await
        .unwrap();

    let svc = MdmLinkExpansionSvc::new(&backend.dao_registry()).unwrap();

    let expanded = svc
        .expand_patient_ids(&["pat-1".to_string(), "pat-4".to_string()])
        .await
        .unwrap();
    assert_eq!(expanded, vec!["pat-1", "pat-2", "pat-4"]);

    assert!(svc.expand_patient_ids(&[]).await.unwrap().is_empty());
}
