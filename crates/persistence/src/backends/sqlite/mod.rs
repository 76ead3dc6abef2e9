//! SQLite backend implementation.
//!
//! This module provides an SQLite implementation of every storage trait in
//! [`crate::core`]. It supports both in-memory databases (great for testing)
//! and file-based databases.
//!
//! # Features
//!
//! - In-memory and file-based modes
//! - CRUD with soft deletes and version history
//! - Stable persistent ids (pids) and id-to-pid resolution
//! - Token, reference and string search through an extracted index
//! - Bulk export jobs, collections, files and keyset-paged pid listings
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use helios_persistence::backends::sqlite::SqliteBackend;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Create an in-memory database
//! let backend = Arc::new(SqliteBackend::in_memory()?);
//!
//! // Initialize the schema
//! backend.init_schema()?;
//!
//! // Hand out typed DAOs
//! let daos = backend.dao_registry();
//! let persons = daos.get_resource_dao("Person")?;
//! # Ok(())
//! # }
//! ```
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE resources (
//!     pid INTEGER PRIMARY KEY AUTOINCREMENT,
//!     resource_type TEXT NOT NULL,
//!     id TEXT NOT NULL,
//!     version_id TEXT NOT NULL,
//!     data BLOB NOT NULL,  -- JSON data
//!     created_at TEXT NOT NULL,
//!     last_updated TEXT NOT NULL,
//!     is_deleted INTEGER NOT NULL DEFAULT 0,
//!     deleted_at TEXT,
//!     UNIQUE (resource_type, id)
//! );
//!
//! CREATE TABLE search_index (
//!     pid INTEGER NOT NULL REFERENCES resources(pid),
//!     param_name TEXT NOT NULL,
//!     value_token_system TEXT,
//!     value_token_code TEXT,
//!     value_reference_type TEXT,
//!     value_reference_id TEXT,
//!     ...
//! );
//!
//! CREATE TABLE bulk_export_jobs (...);
//! CREATE TABLE bulk_export_collections (...);
//! CREATE TABLE bulk_export_files (...);
//! ```

mod backend;
mod bulk_export;
mod schema;
mod search;
mod storage;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use schema::SCHEMA_VERSION;
