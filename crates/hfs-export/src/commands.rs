//! Subcommand implementations. Each returns the JSON document `main` prints.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use helios_bulk_export::{BulkDataExportSvc, BulkExportJobRunner, ExportServices};
use helios_mdm::{MdmResourceDaoSvc, MdmSettings};
use helios_persistence::backends::sqlite::SqliteBackend;
use helios_persistence::core::{BulkJobStatus, ResourceStorage};
use serde_json::{Value, json};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use crate::config::{Command, ExportArgs, ExportCliConfig};

/// Opens the database and makes sure its schema is current.
pub fn open_backend(database: &str) -> anyhow::Result<Arc<SqliteBackend>> {
    info!(database = %database, "Opening SQLite backend");
    let backend = SqliteBackend::open(database)
        .with_context(|| format!("Failed to open database {}", database))?;
    backend.init_schema()?;
    Ok(Arc::new(backend))
}

/// Runs the configured subcommand against `backend`.
pub async fn run(config: &ExportCliConfig, backend: &Arc<SqliteBackend>) -> anyhow::Result<Value> {
    match &config.command {
        Command::Load { files } => load(backend, files).await,
        Command::Export(args) => export(backend, args).await,
        Command::Status { job_uuid } => status(backend, job_uuid).await,
        Command::Eid { value, mdm_rules } => eid(backend, value, mdm_rules).await,
    }
}

/// Loads NDJSON files. Resources with an id are created or updated under it;
/// the rest are created with a new id.
pub async fn load(backend: &SqliteBackend, files: &[PathBuf]) -> anyhow::Result<Value> {
    let mut created = 0u64;
    let mut updated = 0u64;

    for path in files {
        let file = File::open(path)
            .await
            .with_context(|| format!("Failed to open {}", path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let mut line_number = 0usize;

        while let Some(line) = lines.next_line().await? {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let resource: Value = serde_json::from_str(&line)
                .with_context(|| format!("{}:{}: invalid JSON", path.display(), line_number))?;
            let Some(resource_type) = resource.get("resourceType").and_then(Value::as_str) else {
                bail!("{}:{}: missing resourceType", path.display(), line_number);
            };
            let resource_type = resource_type.to_string();

            match resource.get("id").and_then(Value::as_str).map(str::to_string) {
                Some(id) => {
                    let (_, was_created) = backend
                        .create_or_update(&resource_type, &id, resource)
                        .await
                        .with_context(|| format!("{}:{}", path.display(), line_number))?;
                    if was_created {
                        created += 1;
                    } else {
                        updated += 1;
                    }
                }
                None => {
                    backend
                        .create(&resource_type, resource)
                        .await
                        .with_context(|| format!("{}:{}", path.display(), line_number))?;
                    created += 1;
                }
            }
        }
        info!(file = %path.display(), lines = line_number, "Loaded NDJSON file");
    }

    Ok(json!({"files": files.len(), "created": created, "updated": updated}))
}

/// Runs an export to completion and returns its manifest.
pub async fn export(backend: &Arc<SqliteBackend>, args: &ExportArgs) -> anyhow::Result<Value> {
    let services = ExportServices::for_sqlite(backend, args.settings())?;
    let runner = BulkExportJobRunner::new(Arc::new(services));

    let outcome = runner.export(args.to_request()).await?;
    match outcome.manifest {
        Some(manifest) => {
            info!(
                job_uuid = %outcome.job.job_id,
                files = manifest.output.len(),
                resources = manifest.total_count(),
                "Export complete"
            );
            Ok(json!({"jobUUID": outcome.job.job_id, "manifest": manifest}))
        }
        None => bail!(
            "Export job {} ended in {}: {}",
            outcome.job.job_id,
            outcome.job.status,
            outcome
                .job
                .status_message
                .as_deref()
                .unwrap_or("no status message")
        ),
    }
}

/// Describes a job entity, adding the manifest once the job is complete.
pub async fn status(backend: &Arc<SqliteBackend>, job_uuid: &str) -> anyhow::Result<Value> {
    let svc = BulkDataExportSvc::new(backend.clone());
    let job = svc.get_job_info(job_uuid).await?;

    let mut document = json!({"job": job});
    if job.status == BulkJobStatus::Complete {
        document["manifest"] = serde_json::to_value(job.manifest())?;
    }
    Ok(document)
}

/// Looks up the Person holding `value` in the enterprise EID system.
pub async fn eid(
    backend: &Arc<SqliteBackend>,
    value: &str,
    mdm_rules: &Path,
) -> anyhow::Result<Value> {
    let settings = MdmSettings::from_file(mdm_rules)
        .with_context(|| format!("Failed to load MDM rules from {}", mdm_rules.display()))?;
    let svc = MdmResourceDaoSvc::new(&backend.dao_registry(), Arc::new(settings))?;

    let person = svc.search_person_by_eid(value).await?;
    Ok(person.map(|p| p.content().clone()).unwrap_or(Value::Null))
}
