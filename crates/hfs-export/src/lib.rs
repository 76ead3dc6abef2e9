//! `hfs-export`: bulk export, NDJSON loading and MDM lookups against a
//! Helios SQLite store.
//!
//! ```text
//! hfs-export load patients.ndjson observations.ndjson
//! hfs-export export --level group --group-id grp-1 --types Patient,Observation --expand-mdm
//! hfs-export status 6f1c...
//! hfs-export eid E-1234 --mdm-rules mdm-rules.json
//! ```

pub mod commands;
pub mod config;

pub use config::{Command, ExportArgs, ExportCliConfig, ExportLevelArg};

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level`. Output goes to stderr so the
/// JSON printed on stdout stays machine readable.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "hfs_export={level},helios_hfs_export={level},helios_bulk_export={level},\
             helios_batch={level},helios_mdm={level},helios_persistence={level}"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}
