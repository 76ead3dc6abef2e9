//! SQLite schema definitions and migrations.

use rusqlite::Connection;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 2;

fn schema_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::MigrationError { message })
}

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        // Fresh database - create base schema then run all migrations
        create_schema_v1(conn)?;
        set_schema_version(conn, 1)?;
        migrate_schema(conn, 1)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_schema(conn, current_version)?;
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create schema_version table: {}", e)))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| schema_error(format!("Failed to clear schema_version: {}", e)))?;

    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )
    .map_err(|e| schema_error(format!("Failed to set schema_version: {}", e)))?;

    Ok(())
}

/// Create the initial schema (version 1): resources, history and the search index.
fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    // The pid is the rowid, so it is assigned once and survives updates.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS resources (
            pid INTEGER PRIMARY KEY AUTOINCREMENT,
            resource_type TEXT NOT NULL,
            id TEXT NOT NULL,
            version_id TEXT NOT NULL,
            data BLOB NOT NULL,
            created_at TEXT NOT NULL,
            last_updated TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT,
            UNIQUE (resource_type, id)
        )",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create resources table: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS resource_history (
            pid INTEGER NOT NULL REFERENCES resources(pid),
            version_id TEXT NOT NULL,
            data BLOB NOT NULL,
            last_updated TEXT NOT NULL,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (pid, version_id)
        )",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create resource_history table: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS search_index (
            pid INTEGER NOT NULL REFERENCES resources(pid),
            resource_type TEXT NOT NULL,
            param_name TEXT NOT NULL,
            param_url TEXT,
            value_string TEXT,
            value_token_system TEXT,
            value_token_code TEXT,
            value_reference TEXT,
            value_reference_type TEXT,
            value_reference_id TEXT,
            value_uri TEXT
        )",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create search_index table: {}", e)))?;

    create_indexes(conn)
}

fn create_indexes(conn: &Connection) -> StorageResult<()> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_resources_type_pid
            ON resources(resource_type, is_deleted, pid)",
        "CREATE INDEX IF NOT EXISTS idx_resources_updated
            ON resources(resource_type, last_updated)",
        "CREATE INDEX IF NOT EXISTS idx_search_pid
            ON search_index(pid)",
        "CREATE INDEX IF NOT EXISTS idx_search_token
            ON search_index(resource_type, param_name, value_token_code, value_token_system)",
        "CREATE INDEX IF NOT EXISTS idx_search_reference
            ON search_index(resource_type, param_name, value_reference_type, value_reference_id)",
        "CREATE INDEX IF NOT EXISTS idx_search_string
            ON search_index(resource_type, param_name, value_string)",
    ];

    for sql in indexes {
        conn.execute(sql, [])
            .map_err(|e| schema_error(format!("Failed to create index: {}", e)))?;
    }

    Ok(())
}

/// Run migrations from the given version to the current version.
fn migrate_schema(conn: &Connection, from_version: i32) -> StorageResult<()> {
    let mut version = from_version;

    while version < SCHEMA_VERSION {
        match version {
            1 => migrate_v1_to_v2(conn)?,
            _ => {
                return Err(schema_error(format!(
                    "No migration path from schema version {}",
                    version
                )));
            }
        }
        version += 1;
        set_schema_version(conn, version)?;
        tracing::debug!(version, "Migrated SQLite schema");
    }

    Ok(())
}

/// Version 2 adds the bulk export job, collection and file tables.
fn migrate_v1_to_v2(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS bulk_export_jobs (
            job_id TEXT PRIMARY KEY,
            status TEXT NOT NULL,
            status_message TEXT,
            request_json TEXT NOT NULL,
            created_at TEXT NOT NULL,
            status_time TEXT NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create bulk_export_jobs table: {}", e)))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bulk_export_collections (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            job_id TEXT NOT NULL REFERENCES bulk_export_jobs(job_id) ON DELETE CASCADE,
            resource_type TEXT NOT NULL,
            UNIQUE (job_id, resource_type)
        )",
        [],
    )
    .map_err(|e| {
        schema_error(format!(
            "Failed to create bulk_export_collections table: {}",
            e
        ))
    })?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS bulk_export_files (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            collection_id INTEGER NOT NULL
                REFERENCES bulk_export_collections(id) ON DELETE CASCADE,
            file_url TEXT NOT NULL,
            resource_count INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create bulk_export_files table: {}", e)))?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_bulk_jobs_status ON bulk_export_jobs(status)",
        [],
    )
    .map_err(|e| schema_error(format!("Failed to create bulk job index: {}", e)))?;

    Ok(())
}

/// Drop all tables (for testing).
#[cfg(test)]
pub fn drop_all_tables(conn: &Connection) -> StorageResult<()> {
    conn.execute_batch(
        "DROP TABLE IF EXISTS bulk_export_files;
         DROP TABLE IF EXISTS bulk_export_collections;
         DROP TABLE IF EXISTS bulk_export_jobs;
         DROP TABLE IF EXISTS search_index;
         DROP TABLE IF EXISTS resource_history;
         DROP TABLE IF EXISTS resources;
         DROP TABLE IF EXISTS schema_version;",
    )
    .map_err(|e| schema_error(format!("Failed to drop tables: {}", e)))
}
