//! Probe a storage configuration.
//!
//! Loads settings from a JSON file, creates the backend, tests the
//! connection and lists a directory.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use filestore::{StorageFactory, StorageSettings};

#[derive(Debug, Parser)]
#[command(name = "filestore-probe", about = "Check that a file storage configuration works")]
struct Args {
    /// JSON file holding the storage settings
    settings: PathBuf,

    /// Directory to list after connecting
    #[arg(default_value = "")]
    dir: String,

    /// Verify and audit deletes on the object store
    #[arg(long)]
    compliance: bool,

    /// Also list files in sub-directories
    #[arg(short, long)]
    recursive: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let settings = StorageSettings::from_json_file(&args.settings)
        .with_context(|| format!("Failed to load settings from {}", args.settings.display()))?;
    tracing::debug!(?settings, "loaded settings");

    let backend = StorageFactory::create(settings, args.compliance)
        .await
        .context("Failed to create storage backend")?;

    backend
        .test_connection()
        .await
        .context("Connection test failed")?;
    tracing::info!(driver = %backend.driver(), "connection ok");

    let entries = if args.recursive {
        backend.list_directory_recursive(&args.dir).await?
    } else {
        backend.list_directory(&args.dir).await?
    };

    for entry in entries {
        println!("{}", entry);
    }

    Ok(())
}
