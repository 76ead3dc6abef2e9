//! Helios FHIR bulk export CLI.

use clap::Parser;
use helios_hfs_export::{ExportCliConfig, commands, init_logging};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ExportCliConfig::parse();
    init_logging(&config.log_level);

    if let Err(errors) = config.validate() {
        for error in &errors {
            eprintln!("Configuration error: {}", error);
        }
        std::process::exit(1);
    }

    info!(database = %config.database, command = ?config.command, "Starting hfs-export");

    let backend = commands::open_backend(&config.database)?;
    let output = commands::run(&config, &backend).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
