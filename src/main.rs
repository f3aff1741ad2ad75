// src/main.rs

use std::path::PathBuf;

use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use medstack::catalog::JsonFileCatalog;
use medstack::config::CONFIG;
use medstack::engine::input::EngineInput;
use medstack::engine::CompatibilityEngine;

/// Device-configuration compatibility engine.
///
/// Reads a catalog JSON file and a resolved request JSON file, runs the
/// evaluation pipeline, and prints the result envelope as JSON.
#[derive(Debug, Parser)]
#[command(name = "medstack", version, about)]
struct Cli {
    /// Path to the catalog file (JSON array of device records)
    #[arg(long)]
    catalog: PathBuf,

    /// Path to the request file (resolved engine input JSON)
    #[arg(long)]
    request: PathBuf,

    /// Require inner working length >= outer working length at every
    /// junction, overriding both the request and the config default
    #[arg(long)]
    check_length: bool,

    /// Pretty-print the result envelope
    #[arg(long)]
    pretty: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    info!("Starting medstack engine");
    info!("Catalog: {}", cli.catalog.display());
    info!("Candidate cap: {}", CONFIG.max_candidates);

    let request = tokio::fs::read(&cli.request).await?;
    let mut input: EngineInput = serde_json::from_slice(&request)?;
    if cli.check_length {
        input.check_length = Some(true);
    }

    let catalog = JsonFileCatalog::new(&cli.catalog);
    let engine = CompatibilityEngine::new(CONFIG.clone());
    let envelope = engine.run(&input, &catalog).await?;

    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&envelope)?
    } else {
        serde_json::to_string(&envelope)?
    };
    println!("{rendered}");

    Ok(())
}
