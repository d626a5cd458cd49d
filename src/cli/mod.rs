//! Command-line interface.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use commands::memory::MemoryArgs;
use commands::rules::RulesArgs;
use commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "switchboard")]
#[command(about = "Switchboard - coordination core for a broadcast worker swarm", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of .switchboard/
    #[arg(short, long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the orchestrator with pass-through workers
    Run(RunArgs),
    /// Show the subscription table and check it for cycles
    Subscriptions,
    /// Manage standing alert rules
    Rules(RulesArgs),
    /// Inspect worker memory logs
    Memory(MemoryArgs),
    /// Print the last written system snapshot
    Status,
}

/// Print an error and exit with a failure code.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
