//! Ingestion entrypoint.
//!
//! Waits for Elasticsearch, resets the index, then loads every `.txt` book in the source
//! directory. Per-book failures are listed in the report and do not change the exit status;
//! only an unreachable engine, a failed reset or an unreadable directory do.
use anyhow::{Context, Result};
use clap::Parser;
use gutensearch::{
    config,
    elastic::{ElasticService, ElasticSettings},
    ingest::{self, IngestionReport},
    logging,
};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(
    name = "gutensearch-load",
    about = "Parse Project Gutenberg books and bulk-load their paragraphs into Elasticsearch"
)]
struct Cli {
    /// Directory of `.txt` books (defaults to `BOOKS_DIR`).
    #[arg(long)]
    books_dir: Option<PathBuf>,
    /// Documents per bulk request (defaults to `INGEST_BATCH_SIZE`).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    batch_size: Option<u64>,
    /// Print the ingestion report as JSON on stdout.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = config::init_config().context("failed to load configuration")?;
    logging::init_tracing("gutensearch-load");

    let books_dir = cli.books_dir.unwrap_or_else(|| config.books_dir.clone());
    let batch_size = cli
        .batch_size
        .map(|size| size as usize)
        .unwrap_or(config.ingest_batch_size);

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; stopping after the current step");
            on_interrupt.cancel();
        }
    });

    let elastic = ElasticService::connect(&ElasticSettings::from_config(config))
        .context("failed to build Elasticsearch client")?;
    let outcome = ingest::run_ingestion(&elastic, config.connect, &books_dir, batch_size, &cancel).await;
    elastic.close();
    let report = outcome.context("ingestion aborted")?;

    log_report(&report);
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("failed to encode report")?
        );
    }
    Ok(())
}

fn log_report(report: &IngestionReport) {
    for file in report.failed() {
        tracing::warn!(file = %file.path.display(), outcome = ?file.outcome, "Book not fully indexed");
    }
    tracing::info!(
        books = report.succeeded().count(),
        failed = report.failed().count(),
        paragraphs = report.paragraphs_written(),
        interrupted = report.interrupted,
        "Ingestion report"
    );
}
