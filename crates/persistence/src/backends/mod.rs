//! Storage backends.
//!
//! SQLite (feature `sqlite`, on by default) is the only backend. It serves
//! resource storage, pid lookups, search, and the bulk export job tables
//! from one connection pool, either file backed or in memory:
//!
//! ```no_run
//! # #[cfg(feature = "sqlite")]
//! # fn example() -> Result<(), helios_persistence::error::StorageError> {
//! use helios_persistence::backends::sqlite::SqliteBackend;
//!
//! let scratch = SqliteBackend::in_memory()?;
//! scratch.init_schema()?;
//!
//! let store = SqliteBackend::open("fhir.db")?;
//! store.init_schema()?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "sqlite")]
pub mod sqlite;
