//! Loads `SharpHound` and `AzureHound` exports into Neo4j.
//!
//! ```text
//! houndload preprocess            # create constraints, once per database
//! houndload 20240101_users.json   # ingest one export file
//! houndload postprocess           # derive relationships, after every file is loaded
//! ```
//!
//! The database is configured through `NEOURL`, `NEOUSER`, `NEOPWD` and `NEODB`. Logging follows
//! `RUST_LOG` and defaults to `info`.
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use houndload::{Command, ingest::IngestConfig, integrations::neo4j::Neo4j};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "Load BloodHound and AzureHound exports into Neo4j")]
struct Args {
    /// `preprocess`, `postprocess` or the path of an export file
    #[arg(value_name = "preprocess|postprocess|FILE")]
    command: Command,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let neo4j = Neo4j::try_from_env().context("Failed to configure Neo4j")?;
    houndload::run(&args.command, Arc::new(neo4j), &IngestConfig::default()).await?;

    tracing::info!("Finished");
    Ok(())
}
