//! CLI entry point for the taxograph bulk importer.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use taxograph_core::config::Settings;
use taxograph_graph::{GraphClient, GraphConfig};
use taxograph_import::{import_file, ImportOptions, ImportReport};

#[derive(Parser)]
#[command(name = "taxograph-import")]
#[command(about = "Load a category,subcategory edge list into Neo4j")]
struct Cli {
    /// Edge-list file (CSV, optionally gzipped).
    file: PathBuf,

    /// Edges per upsert transaction.
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Concurrent upsert workers.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Retries per batch on transient failures.
    #[arg(long)]
    max_retries: Option<u32>,

    /// Config file prefix (default: taxograph).
    #[arg(short, long, default_value = "taxograph")]
    config: String,

    /// Print the summary as JSON.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let clock = Instant::now();

    match run(&cli).await {
        Ok(report) => {
            // Failed batches are summarized; the run itself still succeeded.
            print_report(&report, cli.json)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("An error occurred: {e:#}");
            eprintln!("Importing Data executed in {:.4} seconds.", clock.elapsed().as_secs_f64());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ImportReport> {
    let Settings {
        neo4j,
        import: mut settings,
        ..
    } = Settings::load(&cli.config)?;
    if let Some(batch_size) = cli.batch_size {
        settings.batch_size = batch_size;
    }
    if let Some(workers) = cli.workers {
        settings.workers = workers;
    }
    if let Some(max_retries) = cli.max_retries {
        settings.max_retries = max_retries;
    }

    let graph = GraphClient::connect(&GraphConfig::from(&neo4j)).await?;

    let report = import_file(
        &cli.file,
        Arc::new(graph),
        settings.batch_size,
        ImportOptions::from(&settings),
    )
    .await?;
    Ok(report)
}

fn print_report(report: &ImportReport, json: bool) -> anyhow::Result<()> {
    if json {
        let mut value = serde_json::to_value(report)?;
        value["failed_batches"] = serde_json::json!(report.failed_batch_seqs());
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Total Records Created: {}", report.total_applied);
    println!("Batches applied: {}", report.batches_applied);
    if report.skipped_rows > 0 {
        println!("Malformed rows skipped: {}", report.skipped_rows);
    }
    if !report.failed_batches.is_empty() {
        println!(
            "Failed batches: {} ({} records) {:?}",
            report.failed_batches.len(),
            report.failed_records(),
            report.failed_batch_seqs()
        );
    }
    println!(
        "Importing Data executed in {:.4} seconds.",
        report.elapsed_ms as f64 / 1000.0
    );
    Ok(())
}
