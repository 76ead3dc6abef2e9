//! End-to-end export jobs against an in-memory SQLite store.

use std::path::Path;
use std::sync::Arc;

use serde_json::{Value, json};

use helios_batch::{BatchStatus, JobParameters};
use helios_bulk_export::{
    BulkExportJobConfig, BulkExportJobRunner, BulkExportSettings, ExportError, ExportOutcome,
    ExportServices,
};
use helios_persistence::backends::sqlite::SqliteBackend;
use helios_persistence::core::{BulkExportJobStore, BulkJobStatus, ExportRequest, ResourceStorage};

fn backend() -> Arc<SqliteBackend> {
    let backend = SqliteBackend::in_memory().unwrap();
    backend.init_schema().unwrap();
    Arc::new(backend)
}

fn runner(backend: &Arc<SqliteBackend>, settings: BulkExportSettings) -> BulkExportJobRunner {
    let services = ExportServices::for_sqlite(backend, settings).unwrap();
    BulkExportJobRunner::new(Arc::new(services))
}

fn settings(dir: &Path, read_chunk_size: u32) -> BulkExportSettings {
    BulkExportSettings::default()
        .with_output_dir(dir)
        .with_read_chunk_size(read_chunk_size)
}

async fn create(backend: &SqliteBackend, resource: Value) {
    let resource_type = resource["resourceType"].as_str().unwrap().to_string();
    backend.create(&resource_type, resource).await.unwrap();
}

async fn seed_patients(backend: &SqliteBackend, count: usize) {
    for i in 0..count {
        create(
            backend,
            json!({"resourceType": "Patient", "id": format!("pat-{}", i)}),
        )
        .await;
    }
}

async fn observation(backend: &SqliteBackend, id: &str, patient: &str) {
    create(
        backend,
        json!({
            "resourceType": "Observation",
            "id": id,
            "status": "final",
            "code": {"text": "weight"},
            "subject": {"reference": format!("Patient/{}", patient)}
        }),
    )
    .await;
}

/// Reads every exported resource id of one type, in file order.
fn exported_ids(outcome: &ExportOutcome, resource_type: &str) -> Vec<String> {
    let collection = outcome.job.collection_for(resource_type).unwrap();
    collection
        .files
        .iter()
        .flat_map(|file| {
            std::fs::read_to_string(&file.file_url)
                .unwrap()
                .lines()
                .map(|line| {
                    let resource: Value = serde_json::from_str(line).unwrap();
                    assert_eq!(resource["resourceType"], resource_type);
                    resource["id"].as_str().unwrap().to_string()
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

#[tokio::test]
async fn test_system_export_splits_files_by_chunk() {
    let backend = backend();
    seed_patients(&backend, 250).await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 1));

    let outcome = runner
        .export(ExportRequest::system().with_types(["Patient"]))
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.execution.status, BatchStatus::Completed);

    let collection = outcome.job.collection_for("Patient").unwrap();
    let counts: Vec<u64> = collection.files.iter().map(|f| f.resource_count).collect();
    assert_eq!(counts, vec![100, 100, 50]);
    assert_eq!(collection.resource_count(), 250);

    let job_dir = dir.path().join(&outcome.job.job_id);
    for n in 1..=3 {
        assert!(job_dir.join(format!("Patient-{}.ndjson", n)).exists());
    }

    let mut ids = exported_ids(&outcome, "Patient");
    ids.sort();
    ids.dedup();
    assert_eq!(ids.len(), 250);
}

#[tokio::test]
async fn test_system_export_with_larger_read_chunk() {
    let backend = backend();
    seed_patients(&backend, 25).await;
    observation(&backend, "obs-1", "pat-1").await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 10));

    let outcome = runner
        .export(ExportRequest::system().with_types(["Patient", "Observation", "Condition"]))
        .await
        .unwrap();

    assert!(outcome.is_complete());
    let job = &outcome.job;
    assert_eq!(job.collection_for("Patient").unwrap().files.len(), 1);
    assert_eq!(job.collection_for("Patient").unwrap().resource_count(), 25);
    assert_eq!(job.collection_for("Observation").unwrap().resource_count(), 1);
    assert!(job.collection_for("Condition").unwrap().files.is_empty());

    let partition_step = outcome.execution.step("partitionStep").unwrap();
    let workers: Vec<&str> = partition_step
        .partitions
        .iter()
        .map(|p| p.step_name.as_str())
        .collect();
    assert_eq!(
        workers,
        vec![
            "bulkExportGenerateResourceFilesStep:Condition",
            "bulkExportGenerateResourceFilesStep:Observation",
            "bulkExportGenerateResourceFilesStep:Patient",
        ]
    );
}

#[tokio::test]
async fn test_manifest_lists_files() {
    let backend = backend();
    seed_patients(&backend, 3).await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 10));

    let outcome = runner
        .export(ExportRequest::system().with_types(["Patient"]))
        .await
        .unwrap();

    let manifest = outcome.manifest.unwrap();
    assert_eq!(manifest.total_count(), 3);
    assert!(manifest.request.contains("_type=Patient"));

    let json = serde_json::to_value(&manifest).unwrap();
    assert_eq!(json["output"][0]["type"], "Patient");
    assert_eq!(json["output"][0]["count"], 3);
}

#[tokio::test]
async fn test_patient_export_reads_compartment() {
    let backend = backend();
    seed_patients(&backend, 2).await;
    observation(&backend, "obs-1", "pat-0").await;
    observation(&backend, "obs-2", "pat-1").await;
    create(
        &backend,
        json!({"resourceType": "Observation", "id": "obs-orphan", "status": "final", "code": {"text": "x"}}),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 5));

    let outcome = runner
        .export(ExportRequest::patient().with_types(["Patient", "Observation"]))
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.execution.job_name, "patientBulkExportJob");

    let mut observations = exported_ids(&outcome, "Observation");
    observations.sort();
    assert_eq!(observations, vec!["obs-1", "obs-2"]);
    assert_eq!(exported_ids(&outcome, "Patient").len(), 2);
}

#[tokio::test]
async fn test_patient_export_covers_medication_requests() {
    let backend = backend();
    seed_patients(&backend, 1).await;
    create(
        &backend,
        json!({
            "resourceType": "MedicationRequest",
            "id": "med-1",
            "status": "active",
            "intent": "order",
            "subject": {"reference": "Patient/pat-0"}
        }),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 10));

    let outcome = runner
        .export(ExportRequest::patient().with_types(["Patient", "MedicationRequest"]))
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(exported_ids(&outcome, "MedicationRequest"), vec!["med-1"]);
    assert_eq!(exported_ids(&outcome, "Patient"), vec!["pat-0"]);
}

#[tokio::test]
async fn test_patient_export_of_non_compartment_type_fails() {
    let backend = backend();
    seed_patients(&backend, 1).await;
    create(
        &backend,
        json!({"resourceType": "Organization", "id": "org-1", "name": "Acme"}),
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 10));

    let outcome = runner
        .export(ExportRequest::patient().with_types(["Patient", "Organization"]))
        .await
        .unwrap();

    assert_eq!(outcome.execution.status, BatchStatus::Failed);
    assert_eq!(outcome.job.status, BulkJobStatus::Error);
    assert!(outcome.manifest.is_none());
    assert!(
        outcome
            .job
            .status_message
            .unwrap()
            .contains("'Organization' has no patient search parameter")
    );
}

async fn seed_group(backend: &SqliteBackend) {
    seed_patients(backend, 4).await;
    for (obs, patient) in [("obs-0", "pat-0"), ("obs-1", "pat-1"), ("obs-2", "pat-2"), ("obs-3", "pat-3")] {
        observation(backend, obs, patient).await;
    }
    create(
        backend,
        json!({
            "resourceType": "Group",
            "id": "grp-1",
            "type": "person",
            "actual": true,
            "member": [
                {"entity": {"reference": "Patient/pat-0"}},
                {"entity": {"reference": "Patient/pat-3"}, "inactive": true}
            ]
        }),
    )
    .await;
    create(
        backend,
        json!({
            "resourceType": "Person",
            "id": "per-1",
            "link": [
                {"target": {"reference": "Patient/pat-0"}},
                {"target": {"reference": "Patient/pat-1"}}
            ]
        }),
    )
    .await;
}

#[tokio::test]
async fn test_group_export_honours_membership() {
    let backend = backend();
    seed_group(&backend).await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 10));

    let outcome = runner
        .export(ExportRequest::group("grp-1").with_types(["Patient", "Observation"]))
        .await
        .unwrap();

    assert!(outcome.is_complete());
    assert_eq!(outcome.execution.job_name, "groupBulkExportJob");
    assert_eq!(exported_ids(&outcome, "Patient"), vec!["pat-0"]);
    assert_eq!(exported_ids(&outcome, "Observation"), vec!["obs-0"]);
}

#[tokio::test]
async fn test_group_export_expands_mdm_links() {
    let backend = backend();
    seed_group(&backend).await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 10));

    let outcome = runner
        .export(
            ExportRequest::group("grp-1")
                .with_types(["Patient", "Observation"])
                .with_expand_mdm(true),
        )
        .await
        .unwrap();

    assert!(outcome.is_complete());
    let mut patients = exported_ids(&outcome, "Patient");
    patients.sort();
    assert_eq!(patients, vec!["pat-0", "pat-1"]);
    let mut observations = exported_ids(&outcome, "Observation");
    observations.sort();
    assert_eq!(observations, vec!["obs-0", "obs-1"]);
}

#[tokio::test]
async fn test_missing_group_fails_job() {
    let backend = backend();
    seed_patients(&backend, 1).await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 10));

    let outcome = runner
        .export(ExportRequest::group("nope").with_types(["Patient"]))
        .await
        .unwrap();

    assert_eq!(outcome.execution.status, BatchStatus::Failed);
    assert_eq!(outcome.job.status, BulkJobStatus::Error);
    assert!(outcome.manifest.is_none());
    assert!(outcome.job.status_message.unwrap().contains("nope"));
}

#[tokio::test]
async fn test_unwritable_output_leaves_job_in_error() {
    let backend = backend();
    seed_patients(&backend, 3).await;
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, b"occupied").unwrap();
    let runner = runner(&backend, settings(&blocker, 10));

    let outcome = runner
        .export(ExportRequest::system().with_types(["Patient"]))
        .await
        .unwrap();

    assert_eq!(outcome.execution.status, BatchStatus::Failed);
    assert!(outcome.execution.step("closeJobStep").is_none());
    assert_eq!(outcome.job.status, BulkJobStatus::Error);
    assert!(outcome.job.status_message.is_some());
    assert!(!outcome.is_complete());
}

#[tokio::test]
async fn test_invalid_read_chunk_marks_job_error() {
    let backend = backend();
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 0));

    let err = runner
        .export(ExportRequest::system().with_types(["Patient"]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("readChunkSize"));

    let jobs = backend.list_jobs(true).await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].status, BulkJobStatus::Error);
    assert!(runner.launcher().repository().is_empty());
}

#[tokio::test]
async fn test_submit_rejects_binary() {
    let backend = backend();
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 10));

    let err = runner
        .export(ExportRequest::system().with_types(["Patient", "Binary"]))
        .await
        .unwrap_err();
    assert!(matches!(err, ExportError::InvalidRequest { .. }));
    assert!(backend.list_jobs(true).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_finished_job_is_not_rerun() {
    let backend = backend();
    seed_patients(&backend, 1).await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 10));

    let outcome = runner
        .export(ExportRequest::system().with_types(["Patient"]))
        .await
        .unwrap();
    let err = runner.run_job(&outcome.job.job_id).await.unwrap_err();
    assert!(err.to_string().contains("invalid job state"));
}

#[tokio::test]
async fn test_run_pending_runs_submitted_jobs() {
    let backend = backend();
    seed_patients(&backend, 2).await;
    let dir = tempfile::tempdir().unwrap();
    let runner = runner(&backend, settings(dir.path(), 10));

    let svc = runner.export_svc();
    svc.submit_job(ExportRequest::system().with_types(["Patient"]))
        .await
        .unwrap();
    svc.submit_job(ExportRequest::patient().with_types(["Patient"]))
        .await
        .unwrap();

    let outcomes = runner.run_pending().await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes.iter().all(ExportOutcome::is_complete));
    assert!(svc.list_pending().await.unwrap().is_empty());
    assert_eq!(runner.launcher().repository().len(), 2);
}

#[tokio::test]
async fn test_job_created_from_parameters() {
    let backend = backend();
    seed_patients(&backend, 4).await;
    let dir = tempfile::tempdir().unwrap();
    let services = ExportServices::for_sqlite(&backend, settings(dir.path(), 2)).unwrap();
    let config = BulkExportJobConfig::new(Arc::new(services));
    let runner = BulkExportJobRunner::new(Arc::clone(config.services()));

    let job = config.bulk_export_job().unwrap();
    let execution = runner
        .launcher()
        .run(
            &job,
            JobParameters::new()
                .with_long("readChunkSize", 2)
                .with_string("resourceTypes", "Patient"),
        )
        .await
        .unwrap();

    assert!(execution.is_completed());
    let job_uuid = execution
        .execution_context
        .get_string("jobUUID")
        .unwrap()
        .to_string();
    let entity = backend.get_job(&job_uuid).await.unwrap().unwrap();
    assert_eq!(entity.status, BulkJobStatus::Complete);
    assert_eq!(entity.collection_for("Patient").unwrap().resource_count(), 4);
}
