//! Test infrastructure for the persistence layer.

pub mod fixtures;

pub use fixtures::*;

use helios_persistence::backends::sqlite::SqliteBackend;

/// Creates an in-memory backend with the schema applied.
pub fn create_backend() -> SqliteBackend {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    backend
}
