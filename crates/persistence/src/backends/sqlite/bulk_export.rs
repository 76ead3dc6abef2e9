//! Bulk export implementation for SQLite backend.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use rusqlite::types::Value as SqlValue;

use crate::core::bulk_export::{
    BulkExportCollection, BulkExportCollectionFile, BulkExportJob, BulkExportJobStore,
    BulkJobStatus, ExportPidProvider, ExportRequest, PatientScope,
};
use crate::error::{BulkExportError, StorageError, StorageResult};
use crate::types::{ResourcePid, SearchParamType};

use super::SqliteBackend;
use super::storage::{format_timestamp, internal_error, parse_timestamp};

/// Reference parameters that place a resource in a patient's compartment.
const COMPARTMENT_PARAMS: [&str; 2] = ["patient", "subject"];

fn load_collections(conn: &Connection, job_id: &str) -> StorageResult<Vec<BulkExportCollection>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, resource_type FROM bulk_export_collections
             WHERE job_id = ?1 ORDER BY id",
        )
        .map_err(|e| internal_error(format!("Failed to prepare collection query: {}", e)))?;

    let headers: Vec<(i64, String)> = stmt
        .query_map(params![job_id], |row| Ok((row.get(0)?, row.get(1)?)))
        .map_err(|e| internal_error(format!("Failed to query collections: {}", e)))?
        .collect::<Result<_, _>>()
        .map_err(|e| internal_error(format!("Failed to read collection row: {}", e)))?;

    headers
        .into_iter()
        .map(|(id, resource_type)| -> StorageResult<BulkExportCollection> {
            Ok(BulkExportCollection {
                id,
                resource_type,
                files: load_files(conn, id)?,
            })
        })
        .collect()
}

fn load_files(conn: &Connection, collection_id: i64) -> StorageResult<Vec<BulkExportCollectionFile>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, file_url, resource_count FROM bulk_export_files
             WHERE collection_id = ?1 ORDER BY id",
        )
        .map_err(|e| internal_error(format!("Failed to prepare file query: {}", e)))?;

    let files = stmt
        .query_map(params![collection_id], |row| {
            Ok(BulkExportCollectionFile {
                id: row.get(0)?,
                file_url: row.get(1)?,
                resource_count: row.get::<_, i64>(2)? as u64,
            })
        })
        .map_err(|e| internal_error(format!("Failed to query files: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| internal_error(format!("Failed to read file row: {}", e)))?;
    Ok(files)
}

/// Raw job columns.
struct JobRow {
    job_id: String,
    status: String,
    status_message: Option<String>,
    request_json: String,
    created_at: String,
    status_time: String,
}

const JOB_COLUMNS: &str = "job_id, status, status_message, request_json, created_at, status_time";

impl JobRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            job_id: row.get(0)?,
            status: row.get(1)?,
            status_message: row.get(2)?,
            request_json: row.get(3)?,
            created_at: row.get(4)?,
            status_time: row.get(5)?,
        })
    }

    fn into_job(self, conn: &Connection) -> StorageResult<BulkExportJob> {
        let status: BulkJobStatus = self
            .status
            .parse()
            .map_err(|_| internal_error(format!("Invalid status in database: {}", self.status)))?;
        let request: ExportRequest = serde_json::from_str(&self.request_json)?;
        let collections = load_collections(conn, &self.job_id)?;

        Ok(BulkExportJob {
            job_id: self.job_id,
            status,
            status_message: self.status_message,
            request,
            created_at: parse_timestamp(&self.created_at)?,
            status_time: parse_timestamp(&self.status_time)?,
            collections,
        })
    }
}

#[async_trait]
impl BulkExportJobStore for SqliteBackend {
    async fn create_job(&self, request: &ExportRequest) -> StorageResult<BulkExportJob> {
        let job_id = uuid::Uuid::new_v4().to_string();
        let now = format_timestamp(Utc::now());
        let request_json = serde_json::to_string(request)?;

        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        tx.execute(
            "INSERT INTO bulk_export_jobs
             (job_id, status, status_message, request_json, created_at, status_time)
             VALUES (?1, ?2, NULL, ?3, ?4, ?4)",
            params![job_id, BulkJobStatus::Submitted.to_string(), request_json, now],
        )
        .map_err(|e| internal_error(format!("Failed to create export job: {}", e)))?;

        let mut seen = std::collections::HashSet::new();
        for resource_type in &request.resource_types {
            if !seen.insert(resource_type.as_str()) {
                continue;
            }
            tx.execute(
                "INSERT INTO bulk_export_collections (job_id, resource_type) VALUES (?1, ?2)",
                params![job_id, resource_type],
            )
            .map_err(|e| internal_error(format!("Failed to create export collection: {}", e)))?;
        }

        let job = tx
            .query_row(
                &format!("SELECT {} FROM bulk_export_jobs WHERE job_id = ?1", JOB_COLUMNS),
                params![job_id],
                JobRow::from_row,
            )
            .map_err(|e| internal_error(format!("Failed to reload export job: {}", e)))?
            .into_job(&tx)?;

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit export job: {}", e)))?;

        tracing::info!(
            job_id = %job.job_id,
            level = %request.level,
            types = ?request.resource_types,
            "Created bulk export job"
        );
        Ok(job)
    }

    async fn get_job(&self, job_id: &str) -> StorageResult<Option<BulkExportJob>> {
        let conn = self.get_connection()?;

        let row = conn
            .query_row(
                &format!("SELECT {} FROM bulk_export_jobs WHERE job_id = ?1", JOB_COLUMNS),
                params![job_id],
                JobRow::from_row,
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to get export job: {}", e)))?;

        row.map(|row| row.into_job(&conn)).transpose()
    }

    async fn set_job_status(
        &self,
        job_id: &str,
        status: BulkJobStatus,
        message: Option<&str>,
    ) -> StorageResult<()> {
        let conn = self.get_connection()?;
        let now = format_timestamp(Utc::now());

        let updated = conn
            .execute(
                "UPDATE bulk_export_jobs SET status = ?1, status_message = ?2, status_time = ?3
                 WHERE job_id = ?4",
                params![status.to_string(), message, now, job_id],
            )
            .map_err(|e| internal_error(format!("Failed to update job status: {}", e)))?;

        if updated == 0 {
            return Err(StorageError::BulkExport(BulkExportError::JobNotFound {
                job_id: job_id.to_string(),
            }));
        }

        tracing::info!(job_id, status = %status, "Bulk export job status changed");
        Ok(())
    }

    async fn get_collection(&self, collection_id: i64) -> StorageResult<BulkExportCollection> {
        let conn = self.get_connection()?;

        let resource_type: String = conn
            .query_row(
                "SELECT resource_type FROM bulk_export_collections WHERE id = ?1",
                params![collection_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to get export collection: {}", e)))?
            .ok_or(StorageError::BulkExport(BulkExportError::CollectionNotFound {
                collection_id,
            }))?;

        Ok(BulkExportCollection {
            id: collection_id,
            resource_type,
            files: load_files(&conn, collection_id)?,
        })
    }

    async fn add_collection_file(
        &self,
        collection_id: i64,
        file_url: &str,
        resource_count: u64,
    ) -> StorageResult<BulkExportCollectionFile> {
        let conn = self.get_connection()?;

        let exists = conn
            .query_row(
                "SELECT 1 FROM bulk_export_collections WHERE id = ?1",
                params![collection_id],
                |_| Ok(()),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to check collection: {}", e)))?
            .is_some();
        if !exists {
            return Err(StorageError::BulkExport(BulkExportError::CollectionNotFound {
                collection_id,
            }));
        }

        conn.execute(
            "INSERT INTO bulk_export_files (collection_id, file_url, resource_count)
             VALUES (?1, ?2, ?3)",
            params![collection_id, file_url, resource_count as i64],
        )
        .map_err(|e| internal_error(format!("Failed to record export file: {}", e)))?;

        Ok(BulkExportCollectionFile {
            id: conn.last_insert_rowid(),
            file_url: file_url.to_string(),
            resource_count,
        })
    }

    async fn list_jobs(&self, include_terminal: bool) -> StorageResult<Vec<BulkExportJob>> {
        let conn = self.get_connection()?;

        let sql = if include_terminal {
            format!(
                "SELECT {} FROM bulk_export_jobs ORDER BY created_at DESC, rowid DESC",
                JOB_COLUMNS
            )
        } else {
            format!(
                "SELECT {} FROM bulk_export_jobs WHERE status IN ('SUBMITTED', 'BUILDING')
                 ORDER BY created_at DESC, rowid DESC",
                JOB_COLUMNS
            )
        };

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| internal_error(format!("Failed to prepare job list: {}", e)))?;
        let rows: Vec<JobRow> = stmt
            .query_map([], JobRow::from_row)
            .map_err(|e| internal_error(format!("Failed to list jobs: {}", e)))?
            .collect::<Result<_, _>>()
            .map_err(|e| internal_error(format!("Failed to read job row: {}", e)))?;

        rows.into_iter().map(|row| row.into_job(&conn)).collect()
    }
}

/// Appends the keyset, since and limit clauses shared by the pid listings.
fn finish_pid_query(
    sql: &mut String,
    bind: &mut Vec<SqlValue>,
    since: Option<DateTime<Utc>>,
    after: Option<ResourcePid>,
    limit: u32,
) {
    if let Some(since) = since {
        sql.push_str(" AND r.last_updated >= ?");
        bind.push(SqlValue::Text(format_timestamp(since)));
    }
    if let Some(after) = after {
        sql.push_str(" AND r.pid > ?");
        bind.push(SqlValue::Integer(after.as_i64()));
    }
    sql.push_str(" ORDER BY r.pid LIMIT ?");
    bind.push(SqlValue::Integer(limit as i64));
}

impl SqliteBackend {
    fn query_pids(&self, sql: &str, bind: Vec<SqlValue>) -> StorageResult<Vec<ResourcePid>> {
        let conn = self.get_connection()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| internal_error(format!("Failed to prepare pid listing: {}", e)))?;

        let pids = stmt
            .query_map(params_from_iter(bind), |row| row.get::<_, i64>(0))
            .map_err(|e| internal_error(format!("Failed to list pids: {}", e)))?
            .map(|row| {
                row.map(ResourcePid::new)
                    .map_err(|e| internal_error(format!("Failed to read pid row: {}", e)))
            })
            .collect::<StorageResult<Vec<_>>>()?;
        Ok(pids)
    }

    /// Registered reference parameters through which `resource_type` points
    /// at a patient.
    fn compartment_params(&self, resource_type: &str) -> StorageResult<Vec<String>> {
        let registry = self.search_registry().read();
        let params: Vec<String> = COMPARTMENT_PARAMS
            .iter()
            .filter(|code| {
                registry
                    .get_param(resource_type, code)
                    .is_some_and(|param| param.param_type == SearchParamType::Reference)
            })
            .map(|code| (*code).to_string())
            .collect();

        if params.is_empty() {
            return Err(BulkExportError::NotInPatientCompartment {
                resource_type: resource_type.to_string(),
            }
            .into());
        }
        Ok(params)
    }
}

#[async_trait]
impl ExportPidProvider for SqliteBackend {
    async fn list_resource_pids(
        &self,
        resource_type: &str,
        since: Option<DateTime<Utc>>,
        after: Option<ResourcePid>,
        limit: u32,
    ) -> StorageResult<Vec<ResourcePid>> {
        let mut sql =
            "SELECT r.pid FROM resources r WHERE r.resource_type = ? AND r.is_deleted = 0"
                .to_string();
        let mut bind = vec![SqlValue::Text(resource_type.to_string())];
        finish_pid_query(&mut sql, &mut bind, since, after, limit);

        self.query_pids(&sql, bind)
    }

    async fn list_compartment_pids(
        &self,
        resource_type: &str,
        scope: &PatientScope,
        since: Option<DateTime<Utc>>,
        after: Option<ResourcePid>,
        limit: u32,
    ) -> StorageResult<Vec<ResourcePid>> {
        let params = if resource_type == "Patient" {
            Vec::new()
        } else {
            self.compartment_params(resource_type)?
        };

        if let PatientScope::Members(ids) = scope
            && ids.is_empty()
        {
            return Ok(Vec::new());
        }

        let mut sql =
            "SELECT r.pid FROM resources r WHERE r.resource_type = ? AND r.is_deleted = 0"
                .to_string();
        let mut bind = vec![SqlValue::Text(resource_type.to_string())];

        let members = match scope {
            PatientScope::Any => None,
            PatientScope::Members(ids) => Some(ids),
        };

        if resource_type == "Patient" {
            if let Some(ids) = members {
                sql.push_str(&format!(" AND r.id IN ({})", vec!["?"; ids.len()].join(", ")));
                bind.extend(ids.iter().map(|id| SqlValue::Text(id.clone())));
            }
        } else {
            sql.push_str(&format!(
                " AND EXISTS (SELECT 1 FROM search_index si WHERE si.pid = r.pid
                   AND si.param_name IN ({}) AND si.value_reference_type = 'Patient'",
                vec!["?"; params.len()].join(", ")
            ));
            bind.extend(params.into_iter().map(SqlValue::Text));
            if let Some(ids) = members {
                sql.push_str(&format!(
                    " AND si.value_reference_id IN ({})",
                    vec!["?"; ids.len()].join(", ")
                ));
                bind.extend(ids.iter().map(|id| SqlValue::Text(id.clone())));
            }
            sql.push(')');
        }

        finish_pid_query(&mut sql, &mut bind, since, after, limit);
        self.query_pids(&sql, bind)
    }
}
