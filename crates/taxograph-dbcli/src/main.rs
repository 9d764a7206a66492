//! CLI entry point for the taxograph query tool.
//!
//! `dbcli <goal> [args...]` runs one numbered goal against Neo4j and prints
//! the result followed by the elapsed time.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use taxograph_core::config::Settings;
use taxograph_core::{Classify, ErrorKind};
use taxograph_graph::{GraphClient, GraphConfig};

use taxograph_dbcli::gate::confirm_on_terminal;
use taxograph_dbcli::{preflight, DbcliError, GateDecision, Goal, GoalRunner};

#[derive(Parser)]
#[command(name = "dbcli")]
#[command(about = "Query, search and bulk-delete the category taxonomy")]
struct Cli {
    /// Goal number (1-13).
    goal: u8,

    /// Goal arguments (node names, search depth, batch size).
    args: Vec<String>,

    /// Config file prefix (default: taxograph).
    #[arg(short, long, default_value = "taxograph")]
    config: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    let settings = Settings::load(&cli.config)?;

    let goal = match Goal::parse(cli.goal, &cli.args) {
        Ok(goal) => goal,
        Err(e) => {
            println!("{e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    if let Goal::Paths { depth, .. } = &goal {
        let depth = depth.unwrap_or(settings.search.default_depth);
        match preflight(depth, settings.search.confirm_threshold, confirm_on_terminal) {
            Ok(GateDecision::Proceed) => {}
            Ok(GateDecision::Abort) => {
                println!("Operation aborted.");
                return Ok(ExitCode::FAILURE);
            }
            Err(e) => {
                println!("{e}");
                println!("Operation aborted.");
                return Ok(ExitCode::FAILURE);
            }
        }
    }

    // The clock starts after any confirmation prompt.
    let clock = Instant::now();
    let result = run(&goal, settings).await;
    let elapsed = clock.elapsed().as_secs_f64();

    match result {
        Ok(()) => {
            println!("Goal {} executed in {elapsed:.4} seconds.", goal.number());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) if e.kind() == ErrorKind::Validation => {
            println!("{e}");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            tracing::error!(goal = goal.number(), error = %e, "Goal failed");
            println!("An error occurred: {e}");
            println!("Goal {} executed in {elapsed:.4} seconds.", goal.number());
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn run(goal: &Goal, settings: Settings) -> Result<(), DbcliError> {
    let graph = GraphClient::connect(&GraphConfig::from(&settings.neo4j)).await?;
    tracing::debug!(uri = %settings.neo4j.uri, "Connected to Neo4j");

    let runner = GoalRunner::new(Arc::new(graph), settings);
    runner.execute(goal, &mut std::io::stdout()).await
}
