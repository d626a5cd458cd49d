//! `switchboard memory`: read a worker's memory log.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::{known_worker, store_provider};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{Config, MemoryStats};
use crate::services::{AgentMemoryLog, MemoryLogSettings};

#[derive(Args, Debug)]
pub struct MemoryArgs {
    #[command(subcommand)]
    pub command: MemoryCommands,
}

#[derive(Subcommand, Debug)]
pub enum MemoryCommands {
    /// Print the newest entries of a worker's log
    Context {
        worker: String,
        /// Number of entries
        #[arg(short, default_value = "5")]
        n: usize,
    },
    /// Print the header counters of a worker's log
    Stats { worker: String },
}

#[derive(Debug, Serialize)]
pub struct ContextOutput {
    pub worker: String,
    pub context: String,
}

impl CommandOutput for ContextOutput {
    fn to_human(&self) -> String {
        if self.context.is_empty() {
            format!("No memory entries for {}.", self.worker)
        } else {
            self.context.clone()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StatsOutput {
    pub worker: String,
    pub entries: usize,
    pub tasks: u64,
    pub successes: u64,
    pub success_rate: f64,
    pub avg_duration_ms: u64,
    pub updated_at: Option<String>,
}

impl StatsOutput {
    fn new(worker: String, stats: &MemoryStats) -> Self {
        Self {
            worker,
            entries: stats.entries,
            tasks: stats.tasks,
            successes: stats.successes,
            success_rate: stats.success_rate(),
            avg_duration_ms: stats.avg_duration_ms(),
            updated_at: stats.updated_at.map(|t| t.to_rfc3339()),
        }
    }
}

impl CommandOutput for StatsOutput {
    fn to_human(&self) -> String {
        let mut lines = vec![
            format!("Worker: {}", self.worker),
            format!("Entries: {}", self.entries),
            format!("Tasks: {} ({} ok, {:.1}%)", self.tasks, self.successes, self.success_rate),
            format!("Avg duration: {}ms", self.avg_duration_ms),
        ];
        if let Some(ref updated) = self.updated_at {
            lines.push(format!("Updated: {updated}"));
        }
        lines.join("\n")
    }
}

pub async fn execute(args: MemoryArgs, config: &Config, json_mode: bool) -> Result<()> {
    let stores = store_provider(config);
    let settings = MemoryLogSettings::from(&config.memory);

    match args.command {
        MemoryCommands::Context { worker, n } => {
            let worker = known_worker(&worker)?;
            let log = AgentMemoryLog::open(worker.clone(), stores.agent_log(&worker), settings).await;
            let out = ContextOutput {
                worker: worker.to_string(),
                context: log.recent_context(n).await,
            };
            output(&out, json_mode);
        }
        MemoryCommands::Stats { worker } => {
            let worker = known_worker(&worker)?;
            let log = AgentMemoryLog::open(worker.clone(), stores.agent_log(&worker), settings).await;
            let stats = log.stats().await;
            output(&StatsOutput::new(worker.to_string(), &stats), json_mode);
        }
    }
    Ok(())
}
