use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use importer_core::{
    parse_archive, ArchiveSource, Importer, ParsedArchive, PathClassifier, SharedBlobPolicy,
};
use importer_http::HttpRegistryConfig;

mod config;
use crate::config::Config;

/// Import a registry export archive into an OCI distribution registry.
#[derive(Parser)]
#[command(version)]
struct Cli {
    #[arg(short, long)]
    config_file: Option<PathBuf>,

    /// Export archive to import.
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Base url of the target registry, eg http://localhost:5000.
    #[arg(short, long)]
    url: Option<String>,

    /// Where blobs referenced from several repositories are placed: first-repository or
    /// all-repositories.
    #[arg(long)]
    shared_blobs: Option<SharedBlobPolicy>,

    /// Parse the archive and list its contents without contacting a registry.
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .compact()
        .init();

    // load configuration
    let config = match &cli.config_file {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };

    let archive = cli
        .file
        .or(config.archive)
        .ok_or_else(|| anyhow!("no archive given, use --file or set `archive` in the config"))?;

    if cli.dry_run {
        let parsed = parse_archive(&PathClassifier::new(), archive.open()?)?;
        list(&parsed);
        return Ok(());
    }

    let registry = cli
        .url
        .map(HttpRegistryConfig::new)
        .or(config.registry)
        .ok_or_else(|| anyhow!("no registry given, use --url or set `registry.url` in the config"))?
        .new_client()?;
    let policy = cli.shared_blobs.unwrap_or(config.shared_blobs);

    tracing::info!(
        "importing {} into {} (shared blobs: {policy:?})",
        archive.display(),
        registry.origin()
    );
    let report = Importer::new(registry)
        .with_shared_blob_policy(policy)
        .import(&archive)
        .await?;

    for (item, failure) in report.failures() {
        tracing::warn!("{item}: {failure}");
    }
    tracing::info!("{}", report.summary());

    Ok(())
}

fn list(parsed: &ParsedArchive) {
    for record in parsed.manifests() {
        tracing::info!(
            "MANIFEST: {} ({:?}, {} blobs)",
            record.qualified_name(),
            record.schema().submission(),
            record.schema().blob_references().len()
        );
    }

    let blobs = parsed.blobs();
    for digest in blobs.missing() {
        tracing::warn!("BLOB: {digest} referenced but not in archive");
    }
    for digest in blobs.orphans() {
        tracing::info!("BLOB: {digest} not referenced by any manifest");
    }
    tracing::info!(
        "{} manifests, {} blobs ({} missing, {} orphans)",
        parsed.manifests().len(),
        blobs.len(),
        blobs.missing().count(),
        blobs.orphans().count()
    );
}
