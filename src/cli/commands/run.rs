//! `switchboard run`: start the orchestrator with pass-through workers.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::cli::commands::{known_worker, store_provider};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::{defaults, Config, Priority, WorkerType};
use crate::infrastructure::workers::PassThroughWorker;
use crate::services::{CounterSnapshot, OrchestratorBuilder};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long, value_name = "SECS")]
    pub duration_secs: Option<u64>,

    /// Submit a task at startup; INPUT is JSON or plain text
    #[arg(long, value_name = "WORKER:INPUT")]
    pub submit: Vec<String>,

    /// Priority of the submitted tasks
    #[arg(short, long, default_value = "normal")]
    pub priority: Priority,

    /// Also register the built-in recurring monitors
    #[arg(long)]
    pub default_schedules: bool,
}

#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub uptime_secs: i64,
    pub counters: CounterSnapshot,
    pub pending: usize,
    pub jobs: usize,
}

impl CommandOutput for RunSummary {
    fn to_human(&self) -> String {
        format!(
            "Ran for {}s: {} processed, {} failed, {} events, {} still pending, {} jobs",
            self.uptime_secs,
            self.counters.tasks_processed,
            self.counters.tasks_failed,
            self.counters.events_triggered,
            self.pending,
            self.jobs,
        )
    }
}

/// Split `WORKER:INPUT`. Input that is not valid JSON becomes `{"text": ...}`.
pub fn parse_submission(raw: &str) -> Result<(WorkerType, Value)> {
    let (worker, input) = raw
        .split_once(':')
        .ok_or_else(|| anyhow!("submission '{raw}' must be WORKER:INPUT"))?;
    let worker = known_worker(worker)?;
    let input = serde_json::from_str(input)
        .unwrap_or_else(|_| serde_json::json!({ "text": input }));
    Ok((worker, input))
}

pub async fn execute(args: RunArgs, config: &Config, json_mode: bool) -> Result<()> {
    let submissions = args
        .submit
        .iter()
        .map(|raw| parse_submission(raw))
        .collect::<Result<Vec<_>>>()?;

    let mut builder = OrchestratorBuilder::from_config(config)?
        .with_stores(store_provider(config))
        .with_subscriptions(defaults::subscriptions());
    for worker in PassThroughWorker::broadcast_set() {
        builder = builder.register_worker(worker);
    }
    let orchestrator = builder.build().await?;

    orchestrator
        .register_configured_schedules(&config.schedules)
        .await
        .context("Failed to register configured schedules")?;
    if args.default_schedules {
        for (worker, interval) in defaults::schedules() {
            orchestrator
                .register_job(&WorkerType::new(worker), interval, config.orchestrator.schedule_priority)
                .await?;
        }
    }

    for (worker, input) in submissions {
        let id = orchestrator.submit_task(&worker, input, args.priority)?;
        info!(task_id = %id, worker = %worker, "Task submitted");
    }

    orchestrator.start().await;
    match args.duration_secs {
        Some(secs) => {
            tokio::select! {
                () = tokio::time::sleep(Duration::from_secs(secs)) => {}
                res = tokio::signal::ctrl_c() => res.context("Failed to listen for Ctrl-C")?,
            }
        }
        None => tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?,
    }
    orchestrator.shutdown().await;

    let snapshot = orchestrator.snapshot().await;
    let summary = RunSummary {
        uptime_secs: snapshot.uptime_secs(),
        counters: snapshot.counters,
        pending: snapshot.queue_depth,
        jobs: snapshot.jobs.len(),
    };
    output(&summary, json_mode);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_submission_json_and_text() {
        let (worker, input) = parse_submission("caption:{\"text\":\"hello\"}").unwrap();
        assert_eq!(worker.as_str(), "caption");
        assert_eq!(input["text"], "hello");

        let (_, input) = parse_submission("clip:raw footage: take 2").unwrap();
        assert_eq!(input["text"], "raw footage: take 2");
    }

    #[test]
    fn test_parse_submission_rejects_bad_input() {
        assert!(parse_submission("no-separator").is_err());
        assert!(parse_submission("weather:{}").is_err());
    }
}
