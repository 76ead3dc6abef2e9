//! ResourceStorage and IdHelper implementations for SQLite.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Value;

use crate::core::{IdHelper, ResourceStorage};
use crate::error::{BackendError, ResourceError, StorageError, StorageResult, ValidationError};
use crate::search::converters::IndexValue;
use crate::types::{ResourcePid, StoredResource};

use super::SqliteBackend;

/// Columns selected by every query that loads a full resource row.
pub(super) const RESOURCE_COLUMNS: &str =
    "pid, resource_type, id, version_id, data, created_at, last_updated";

pub(super) fn internal_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

fn serialization_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::SerializationError { message })
}

/// Fixed-width RFC 3339 so stored timestamps compare correctly as text.
pub(super) fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(super) fn parse_timestamp(value: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| internal_error(format!("Invalid timestamp '{}': {}", value, e)))
}

/// A raw row from the resources table.
pub(super) struct ResourceRow {
    pid: i64,
    resource_type: String,
    id: String,
    version_id: String,
    data: Vec<u8>,
    created_at: String,
    last_updated: String,
}

impl ResourceRow {
    /// Maps a row selected with [`RESOURCE_COLUMNS`].
    pub(super) fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            pid: row.get(0)?,
            resource_type: row.get(1)?,
            id: row.get(2)?,
            version_id: row.get(3)?,
            data: row.get(4)?,
            created_at: row.get(5)?,
            last_updated: row.get(6)?,
        })
    }

    pub(super) fn into_stored(self) -> StorageResult<StoredResource> {
        let content: Value = serde_json::from_slice(&self.data)
            .map_err(|e| serialization_error(format!("Failed to deserialize resource: {}", e)))?;

        Ok(StoredResource::from_storage(
            self.resource_type,
            self.id,
            ResourcePid::new(self.pid),
            self.version_id,
            content,
            parse_timestamp(&self.created_at)?,
            parse_timestamp(&self.last_updated)?,
            None,
        ))
    }
}

/// Existing row state consulted before writes.
struct RowState {
    pid: i64,
    version_id: String,
    created_at: String,
    is_deleted: bool,
}

fn find_row_state(
    conn: &Connection,
    resource_type: &str,
    id: &str,
) -> StorageResult<Option<RowState>> {
    conn.query_row(
        "SELECT pid, version_id, created_at, is_deleted FROM resources
         WHERE resource_type = ?1 AND id = ?2",
        params![resource_type, id],
        |row| {
            Ok(RowState {
                pid: row.get(0)?,
                version_id: row.get(1)?,
                created_at: row.get(2)?,
                is_deleted: row.get::<_, i32>(3)? != 0,
            })
        },
    )
    .optional()
    .map_err(|e| internal_error(format!("Failed to look up resource: {}", e)))
}

fn next_version(current: &str) -> String {
    (current.parse::<u64>().unwrap_or(0) + 1).to_string()
}

/// Stamps the resource with its type and id.
fn normalize(resource: &mut Value, resource_type: &str, id: &str) -> StorageResult<()> {
    let obj = resource
        .as_object_mut()
        .ok_or_else(|| ValidationError::InvalidResource {
            message: "resource must be a JSON object".to_string(),
        })?;
    obj.insert(
        "resourceType".to_string(),
        Value::String(resource_type.to_string()),
    );
    obj.insert("id".to_string(), Value::String(id.to_string()));
    Ok(())
}

#[async_trait]
impl ResourceStorage for SqliteBackend {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn create(&self, resource_type: &str, resource: Value) -> StorageResult<StoredResource> {
        let id = resource
            .get("id")
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        match find_row_state(&tx, resource_type, &id)? {
            Some(state) if state.is_deleted => {
                return Err(StorageError::Resource(ResourceError::Gone {
                    resource_type: resource_type.to_string(),
                    id,
                    deleted_at: None,
                }));
            }
            Some(_) => {
                return Err(StorageError::Resource(ResourceError::AlreadyExists {
                    resource_type: resource_type.to_string(),
                    id,
                }));
            }
            None => {}
        }

        let stored = self.insert_resource(&tx, resource_type, &id, resource)?;
        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit create: {}", e)))?;

        tracing::debug!(resource_type, id = %id, pid = stored.pid().map(|p| p.as_i64()), "Created resource");
        Ok(stored)
    }

    async fn create_or_update(
        &self,
        resource_type: &str,
        id: &str,
        resource: Value,
    ) -> StorageResult<(StoredResource, bool)> {
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let result = match find_row_state(&tx, resource_type, id)? {
            // A deleted row is revived under its original pid.
            Some(state) => (self.replace_resource(&tx, resource_type, id, &state, resource)?, false),
            None => (self.insert_resource(&tx, resource_type, id, resource)?, true),
        };

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit update: {}", e)))?;
        Ok(result)
    }

    async fn read(&self, resource_type: &str, id: &str) -> StorageResult<Option<StoredResource>> {
        let conn = self.get_connection()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM resources
                     WHERE resource_type = ?1 AND id = ?2 AND is_deleted = 0",
                    RESOURCE_COLUMNS
                ),
                params![resource_type, id],
                ResourceRow::from_row,
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read resource: {}", e)))?;

        row.map(ResourceRow::into_stored).transpose()
    }

    async fn read_by_pid(
        &self,
        resource_type: &str,
        pid: ResourcePid,
    ) -> StorageResult<Option<StoredResource>> {
        let conn = self.get_connection()?;

        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM resources
                     WHERE pid = ?1 AND resource_type = ?2 AND is_deleted = 0",
                    RESOURCE_COLUMNS
                ),
                params![pid.as_i64(), resource_type],
                ResourceRow::from_row,
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to read resource by pid: {}", e)))?;

        row.map(ResourceRow::into_stored).transpose()
    }

    async fn read_by_pids(
        &self,
        resource_type: &str,
        pids: &[ResourcePid],
    ) -> StorageResult<Vec<StoredResource>> {
        if pids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_connection()?;
        let placeholders = vec!["?"; pids.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM resources
             WHERE resource_type = ? AND is_deleted = 0 AND pid IN ({})",
            RESOURCE_COLUMNS, placeholders
        );

        let mut bind: Vec<rusqlite::types::Value> = Vec::with_capacity(pids.len() + 1);
        bind.push(resource_type.to_string().into());
        bind.extend(pids.iter().map(|p| rusqlite::types::Value::Integer(p.as_i64())));

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| internal_error(format!("Failed to prepare pid query: {}", e)))?;
        let rows = stmt
            .query_map(params_from_iter(bind), ResourceRow::from_row)
            .map_err(|e| internal_error(format!("Failed to query resources by pid: {}", e)))?;

        let mut by_pid = HashMap::with_capacity(pids.len());
        for row in rows {
            let row = row.map_err(|e| internal_error(format!("Failed to read row: {}", e)))?;
            let stored = row.into_stored()?;
            if let Some(pid) = stored.pid() {
                by_pid.insert(pid, stored);
            }
        }

        Ok(pids.iter().filter_map(|pid| by_pid.remove(pid)).collect())
    }

    async fn update(&self, current: &StoredResource, resource: Value) -> StorageResult<StoredResource> {
        let resource_type = current.resource_type();
        let id = current.id();

        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let state = match find_row_state(&tx, resource_type, id)? {
            Some(state) if !state.is_deleted => state,
            _ => {
                return Err(StorageError::Resource(ResourceError::NotFound {
                    resource_type: resource_type.to_string(),
                    id: id.to_string(),
                }));
            }
        };

        let stored = self.replace_resource(&tx, resource_type, id, &state, resource)?;
        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit update: {}", e)))?;
        Ok(stored)
    }

    async fn delete(&self, resource_type: &str, id: &str) -> StorageResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn
            .transaction()
            .map_err(|e| internal_error(format!("Failed to begin transaction: {}", e)))?;

        let state = find_row_state(&tx, resource_type, id)?.ok_or_else(|| {
            StorageError::Resource(ResourceError::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            })
        })?;

        if state.is_deleted {
            return Err(StorageError::Resource(ResourceError::Gone {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
                deleted_at: None,
            }));
        }

        let deleted_at = format_timestamp(Utc::now());
        let new_version = next_version(&state.version_id);

        tx.execute(
            "UPDATE resources SET is_deleted = 1, deleted_at = ?1, version_id = ?2, last_updated = ?1
             WHERE pid = ?3",
            params![deleted_at, new_version, state.pid],
        )
        .map_err(|e| internal_error(format!("Failed to delete resource: {}", e)))?;

        tx.execute(
            "INSERT INTO resource_history (pid, version_id, data, last_updated, is_deleted)
             SELECT pid, version_id, data, last_updated, 1 FROM resources WHERE pid = ?1",
            params![state.pid],
        )
        .map_err(|e| internal_error(format!("Failed to insert deletion history: {}", e)))?;

        delete_search_index(&tx, state.pid)?;

        tx.commit()
            .map_err(|e| internal_error(format!("Failed to commit delete: {}", e)))?;
        Ok(())
    }

    async fn count(&self, resource_type: Option<&str>) -> StorageResult<u64> {
        let conn = self.get_connection()?;

        let count: i64 = if let Some(rt) = resource_type {
            conn.query_row(
                "SELECT COUNT(*) FROM resources WHERE resource_type = ?1 AND is_deleted = 0",
                params![rt],
                |row| row.get(0),
            )
        } else {
            conn.query_row(
                "SELECT COUNT(*) FROM resources WHERE is_deleted = 0",
                [],
                |row| row.get(0),
            )
        }
        .map_err(|e| internal_error(format!("Failed to count resources: {}", e)))?;

        Ok(count as u64)
    }
}

#[async_trait]
impl IdHelper for SqliteBackend {
    async fn resolve_resource_pid(&self, resource_type: &str, id: &str) -> StorageResult<ResourcePid> {
        let conn = self.get_connection()?;

        let pid: Option<i64> = conn
            .query_row(
                "SELECT pid FROM resources
                 WHERE resource_type = ?1 AND id = ?2 AND is_deleted = 0",
                params![resource_type, id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| internal_error(format!("Failed to resolve pid: {}", e)))?;

        pid.map(ResourcePid::new).ok_or_else(|| {
            StorageError::Resource(ResourceError::NotFound {
                resource_type: resource_type.to_string(),
                id: id.to_string(),
            })
        })
    }
}

// Write helpers
impl SqliteBackend {
    fn insert_resource(
        &self,
        conn: &Connection,
        resource_type: &str,
        id: &str,
        mut resource: Value,
    ) -> StorageResult<StoredResource> {
        normalize(&mut resource, resource_type, id)?;
        let data = serde_json::to_vec(&resource)
            .map_err(|e| serialization_error(format!("Failed to serialize resource: {}", e)))?;

        let now = Utc::now();
        let timestamp = format_timestamp(now);
        let version_id = "1";

        conn.execute(
            "INSERT INTO resources (resource_type, id, version_id, data, created_at, last_updated, is_deleted)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5, 0)",
            params![resource_type, id, version_id, data, timestamp],
        )
        .map_err(|e| internal_error(format!("Failed to insert resource: {}", e)))?;
        let pid = conn.last_insert_rowid();

        conn.execute(
            "INSERT INTO resource_history (pid, version_id, data, last_updated, is_deleted)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![pid, version_id, data, timestamp],
        )
        .map_err(|e| internal_error(format!("Failed to insert history: {}", e)))?;

        self.index_resource(conn, pid, resource_type, &resource)?;

        // Reload the timestamps from their stored form so callers see what reads see.
        let now = parse_timestamp(&timestamp)?;
        Ok(StoredResource::from_storage(
            resource_type,
            id,
            ResourcePid::new(pid),
            version_id,
            resource,
            now,
            now,
            None,
        ))
    }

    fn replace_resource(
        &self,
        conn: &Connection,
        resource_type: &str,
        id: &str,
        state: &RowState,
        mut resource: Value,
    ) -> StorageResult<StoredResource> {
        normalize(&mut resource, resource_type, id)?;
        let data = serde_json::to_vec(&resource)
            .map_err(|e| serialization_error(format!("Failed to serialize resource: {}", e)))?;

        let timestamp = format_timestamp(Utc::now());
        let new_version = next_version(&state.version_id);

        conn.execute(
            "UPDATE resources
             SET version_id = ?1, data = ?2, last_updated = ?3, is_deleted = 0, deleted_at = NULL
             WHERE pid = ?4",
            params![new_version, data, timestamp, state.pid],
        )
        .map_err(|e| internal_error(format!("Failed to update resource: {}", e)))?;

        conn.execute(
            "INSERT INTO resource_history (pid, version_id, data, last_updated, is_deleted)
             VALUES (?1, ?2, ?3, ?4, 0)",
            params![state.pid, new_version, data, timestamp],
        )
        .map_err(|e| internal_error(format!("Failed to insert history: {}", e)))?;

        delete_search_index(conn, state.pid)?;
        self.index_resource(conn, state.pid, resource_type, &resource)?;

        Ok(StoredResource::from_storage(
            resource_type,
            id,
            ResourcePid::new(state.pid),
            new_version,
            resource,
            parse_timestamp(&state.created_at)?,
            parse_timestamp(&timestamp)?,
            None,
        ))
    }

    /// Writes search index rows for every registered parameter of the type.
    pub(crate) fn index_resource(
        &self,
        conn: &Connection,
        pid: i64,
        resource_type: &str,
        resource: &Value,
    ) -> StorageResult<()> {
        let values = self
            .search_extractor()
            .extract(resource, resource_type)
            .map_err(|e| ValidationError::InvalidResource {
                message: e.to_string(),
            })?;

        let mut stmt = conn
            .prepare_cached(
                "INSERT INTO search_index
                 (pid, resource_type, param_name, param_url, value_string,
                  value_token_system, value_token_code,
                  value_reference, value_reference_type, value_reference_id, value_uri)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )
            .map_err(|e| internal_error(format!("Failed to prepare index insert: {}", e)))?;

        for extracted in &values {
            let mut string = None;
            let mut token = (None, None);
            let mut reference = (None, None, None);
            let mut uri = None;

            match &extracted.value {
                IndexValue::String(s) => string = Some(s.as_str()),
                IndexValue::Token { system, code } => {
                    token = (system.as_deref(), Some(code.as_str()))
                }
                IndexValue::Reference {
                    reference: r,
                    resource_type,
                    resource_id,
                } => {
                    reference = (
                        Some(r.as_str()),
                        resource_type.as_deref(),
                        resource_id.as_deref(),
                    )
                }
                IndexValue::Uri(u) => uri = Some(u.as_str()),
            }

            stmt.execute(params![
                pid,
                resource_type,
                extracted.param_name,
                extracted.param_url,
                string,
                token.0,
                token.1,
                reference.0,
                reference.1,
                reference.2,
                uri,
            ])
            .map_err(|e| internal_error(format!("Failed to write index entry: {}", e)))?;
        }

        tracing::trace!(pid, resource_type, entries = values.len(), "Indexed resource");
        Ok(())
    }
}

fn delete_search_index(conn: &Connection, pid: i64) -> StorageResult<()> {
    conn.execute("DELETE FROM search_index WHERE pid = ?1", params![pid])
        .map_err(|e| internal_error(format!("Failed to delete search index: {}", e)))?;
    Ok(())
}
