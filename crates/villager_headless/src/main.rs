//! Headless villager scenario runner.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario with its own tick count and delta
//! cargo run -p villager_headless -- run --scenario scenarios/gather.ron
//!
//! # Override the run length and tick delta
//! cargo run -p villager_headless -- run --scenario scenarios/skirmish.ron --ticks 2000 --dt 0.05
//! ```
//!
//! Output (stdout): JSON summary
//! Logs (stderr): human-readable, `RUST_LOG` respected

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use villager_headless::{run_scenario, RunOptions, Scenario};

#[derive(Parser)]
#[command(name = "villager_headless")]
#[command(about = "Headless villager scenario runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print a JSON summary
    Run {
        /// Scenario file to load
        #[arg(short, long)]
        scenario: PathBuf,

        /// Number of ticks to run (defaults to the scenario's)
        #[arg(short, long)]
        ticks: Option<u64>,

        /// Seconds per tick (defaults to the scenario's)
        #[arg(long)]
        dt: Option<f64>,

        /// Pretty-print the summary
        #[arg(long)]
        pretty: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    // Logs to stderr; stdout carries the summary
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    match cli.command {
        Commands::Run {
            scenario,
            ticks,
            dt,
            pretty,
        } => cmd_run(&scenario, RunOptions { ticks, dt }, pretty),
    }
}

/// Run a single scenario
fn cmd_run(path: &Path, options: RunOptions, pretty: bool) {
    tracing::info!("Running scenario: {}", path.display());

    let scenario = match Scenario::load(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to load scenario: {}", e);
            std::process::exit(1);
        }
    };

    let summary = match run_scenario(&scenario, options) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Scenario failed: {}", e);
            std::process::exit(1);
        }
    };

    let json = if pretty {
        serde_json::to_string_pretty(&summary)
    } else {
        serde_json::to_string(&summary)
    };
    match json {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Failed to encode summary: {}", e);
            std::process::exit(1);
        }
    }
}
