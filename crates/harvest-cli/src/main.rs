//! Harvest CLI
//!
//! Crawls the drug-class catalog and the reference book into a directory
//! tree of plain-text files. With no arguments both jobs run with defaults.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use harvest_core::job::JobOutput;
use harvest_core::{run_book, run_catalog, ChromeEngine, Config, RenderEngine, RunReport};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "harvest")]
#[command(author, version, about = "Crawl catalog and book sites into a text tree", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Config file (defaults to the user config directory, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Root of the output tree
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Ignore the completion ledger and re-fetch everything
    #[arg(long, global = true)]
    fresh: bool,

    /// Chrome binary to use
    #[arg(long, global = true)]
    chrome: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, global = true)]
    headful: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Crawl the drug-class catalog only
    Catalog,
    /// Crawl the book's table of contents only
    Book,
    /// Crawl both (the default)
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(output) = cli.output {
        config.output_dir = output;
    }
    if cli.fresh {
        config.resume = false;
    }
    if let Some(chrome) = cli.chrome {
        config.chrome.chrome_path = Some(chrome);
    }
    if cli.headful {
        config.chrome.headless = false;
    }

    let command = cli.command.unwrap_or(Commands::All);
    let mut engine = ChromeEngine::launch(config.chrome.clone())
        .await
        .context("starting Chrome")?;

    let result = run(&mut engine, &config, command).await;
    if let Err(e) = engine.close().await {
        warn!("Failed to close browser: {}", e);
    }
    let report = result?;

    info!("Finished: {}", report);
    for failure in report.failed_roots.iter().chain(&report.failed_items) {
        warn!("Failed: {}", failure);
    }

    Ok(())
}

async fn run(engine: &mut ChromeEngine, config: &Config, command: Commands) -> Result<RunReport> {
    let mut report = RunReport::default();

    if matches!(command, Commands::Catalog | Commands::All) {
        let mut output = JobOutput::open(&config.catalog_root(), config.name_budget, config.resume)?;
        let catalog = run_catalog(engine, &config.catalog, &mut output)
            .await
            .context("catalog crawl")?;
        report.merge(catalog);
    }

    if matches!(command, Commands::Book | Commands::All) {
        let mut output = JobOutput::open(&config.book_root(), config.name_budget, config.resume)?;
        let book = run_book(engine, &config.book, &mut output)
            .await
            .context("book crawl")?;
        report.merge(book);
    }

    Ok(report)
}
