//! SQLite backend integration tests.
//!
//! These tests drive the backend through the public DAO and bulk export APIs.

mod common;

use std::sync::Arc;

use serde_json::json;

use common::*;
use helios_persistence::core::{
    BulkExportJobStore, BulkJobStatus, ExportPidProvider, ExportRequest, IdHelper, PatientScope,
    ResourceStorage,
};
use helios_persistence::error::{StorageError, ValidationError};
use helios_persistence::search::util;
use helios_persistence::types::{IdType, SearchQuery, SearchValue};

// ============================================================================
// DAO Tests
// ============================================================================

#[tokio::test]
async fn test_dao_create_and_read() {
    let backend = Arc::new(create_backend());
    let daos = backend.dao_registry();
    let patients = daos.get_resource_dao("Patient").unwrap();

    let outcome = patients
        .create(PatientFixture::new("pat-1", "Smith").to_json())
        .await
        .unwrap();
    assert!(outcome.created);
    assert_eq!(outcome.id.to_string(), "Patient/pat-1/_history/1");

    let read = patients.read(&IdType::new("Patient", "pat-1")).await.unwrap();
    assert_eq!(read.content()["name"][0]["family"], "Smith");

    let by_pid = patients.read_by_pid(read.pid().unwrap()).await.unwrap();
    assert_eq!(by_pid.id(), "pat-1");
}

#[tokio::test]
async fn test_dao_read_missing_is_not_found() {
    let backend = Arc::new(create_backend());
    let persons = backend.dao_registry().get_resource_dao("Person").unwrap();

    let err = persons.read(&IdType::of_id("nobody")).await.unwrap_err();
    assert!(err.is_not_found());

    let err = persons
        .read_by_pid(helios_persistence::types::ResourcePid::new(12345))
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_dao_rejects_wrong_type() {
    let backend = Arc::new(create_backend());
    let persons = backend.dao_registry().get_resource_dao("Person").unwrap();

    let err = persons
        .read(&IdType::new("Patient", "pat-1"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::InvalidId { .. })
    ));

    let err = persons
        .create(PatientFixture::new("pat-1", "Smith").to_json())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::InvalidResource { .. })
    ));
}

#[tokio::test]
async fn test_dao_update_requires_id() {
    let backend = Arc::new(create_backend());
    let persons = backend.dao_registry().get_resource_dao("Person").unwrap();

    let err = persons
        .update(json!({"resourceType": "Person"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::MissingRequiredField { .. })
    ));

    let first = persons
        .update(PersonFixture::new("per-1").to_json())
        .await
        .unwrap();
    assert!(first.created);

    let second = persons
        .update(PersonFixture::new("per-1").with_eid("E-9").to_json())
        .await
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.id.version_id_part(), Some("2"));
    assert_eq!(second.resource.pid(), first.resource.pid());
}

#[tokio::test]
async fn test_dao_search_by_identifier() {
    let backend = Arc::new(create_backend());
    let persons = backend.dao_registry().get_resource_dao("Person").unwrap();

    persons
        .create(PersonFixture::new("per-1").with_eid("E-1").to_json())
        .await
        .unwrap();
    persons
        .create(PersonFixture::new("per-2").with_eid("E-2").to_json())
        .await
        .unwrap();

    let query = SearchQuery::new("Person")
        .with_value("identifier", SearchValue::token(EID_SYSTEM, "E-2"))
        .load_synchronous();
    let result = persons.search(query).await.unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(result.first().unwrap().id(), "per-2");
}

#[tokio::test]
async fn test_unsupported_dao_type() {
    let backend = Arc::new(create_backend());
    let err = backend.dao_registry().get_resource_dao("Spaceship").unwrap_err();
    assert!(matches!(
        err,
        StorageError::Validation(ValidationError::UnsupportedResourceType { .. })
    ));
}

// ============================================================================
// Id Helper Tests
// ============================================================================

#[tokio::test]
async fn test_id_helper_resolves_after_update() {
    let backend = create_backend();

    let created = backend
        .create("Patient", PatientFixture::new("pat-1", "Smith").to_json())
        .await
        .unwrap();
    backend
        .update(&created, PatientFixture::new("pat-1", "Smyth").to_json())
        .await
        .unwrap();

    let pid = backend.resolve_resource_pid("Patient", "pat-1").await.unwrap();
    assert_eq!(Some(pid), created.pid());
}

// ============================================================================
// Schema Accessor Tests
// ============================================================================

#[test]
fn test_search_parameter_util_through_backend_schema() {
    let backend = create_backend();
    let param = json!({
        "resourceType": "SearchParameter",
        "url": "http://example.org/SearchParameter/eid",
        "code": "eid",
        "base": ["Patient", "Person"],
        "type": "token",
        "expression": "Person.identifier"
    });

    let schema = backend.schema();
    assert_eq!(
        util::base_as_strings(schema, &param).unwrap(),
        vec!["Patient", "Person"]
    );
    assert_eq!(util::code(schema, &param).unwrap().as_deref(), Some("eid"));
    assert_eq!(
        util::expression(schema, &param).unwrap().as_deref(),
        Some("Person.identifier")
    );
}

// ============================================================================
// Bulk Export Tests
// ============================================================================

#[tokio::test]
async fn test_bulk_export_job_lifecycle() {
    let backend = create_backend();

    let job = backend
        .create_job(&ExportRequest::group("grp-1").with_types(["Patient", "Observation"]))
        .await
        .unwrap();
    assert_eq!(job.status, BulkJobStatus::Submitted);
    assert_eq!(job.request.group_id(), Some("grp-1"));

    backend
        .set_job_status(&job.job_id, BulkJobStatus::Building, None)
        .await
        .unwrap();

    let patients = job.collection_for("Patient").unwrap();
    backend
        .add_collection_file(patients.id, "/exports/Patient-1.ndjson", 2)
        .await
        .unwrap();

    backend
        .set_job_status(&job.job_id, BulkJobStatus::Complete, None)
        .await
        .unwrap();

    let loaded = backend.get_job(&job.job_id).await.unwrap().unwrap();
    assert!(loaded.status.is_terminal());
    let manifest = loaded.manifest();
    assert_eq!(manifest.output.len(), 1);
    assert_eq!(manifest.total_count(), 2);
}

#[tokio::test]
async fn test_group_compartment_listing() {
    let backend = create_backend();

    for id in ["pat-1", "pat-2", "pat-3"] {
        backend
            .create("Patient", PatientFixture::new(id, "Doe").to_json())
            .await
            .unwrap();
    }
    backend
        .create("Observation", observation("obs-1", "pat-1", "8867-4"))
        .await
        .unwrap();
    backend
        .create("Observation", observation("obs-2", "pat-3", "8867-4"))
        .await
        .unwrap();
    backend
        .create("Group", group("grp-1", &["pat-1", "pat-2"]))
        .await
        .unwrap();

    let scope = PatientScope::Members(vec!["pat-1".to_string(), "pat-2".to_string()]);
    let pids = backend
        .list_compartment_pids("Observation", &scope, None, None, 100)
        .await
        .unwrap();
    let observations = backend.read_by_pids("Observation", &pids).await.unwrap();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].id(), "obs-1");

    let all = backend
        .list_resource_pids("Observation", None, None, 100)
        .await
        .unwrap();
    assert_eq!(all.len(), 2);
}
