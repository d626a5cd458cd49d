//! `switchboard rules`: manage standing alert rules.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::commands::{known_worker, store_provider};
use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{Config, HopeRule, Priority, RuleId, RuleSchedule, UserProfile};
use crate::domain::ports::{AlertSink, StoreProvider};
use crate::infrastructure::notify::TracingAlertSink;
use crate::services::{KeywordPredicate, NotificationRouter, RuleEngine, RuleEngineConfig};

#[derive(Args, Debug)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommands,
}

#[derive(Subcommand, Debug)]
pub enum RulesCommands {
    /// Add a standing rule to a worker
    Add {
        /// Worker type the rule watches
        worker: String,
        /// Condition text; its keywords are matched against task results
        condition: String,
        /// IMMEDIATE or DAILY@<hour>
        #[arg(short, long, default_value = "immediate")]
        schedule: RuleSchedule,
        /// Alert priority
        #[arg(short, long, default_value = "normal")]
        priority: Priority,
    },
    /// Cancel a rule
    Cancel {
        worker: String,
        /// Rule id, e.g. hope_001
        rule_id: String,
    },
    /// List rules, for one worker or all
    List { worker: Option<String> },
}

#[derive(Debug, Serialize)]
pub struct RuleOutput {
    pub id: String,
    pub worker: String,
    pub condition: String,
    pub schedule: String,
    pub priority: String,
    pub status: String,
    pub trigger_count: u64,
    pub last_triggered: Option<String>,
}

impl From<&HopeRule> for RuleOutput {
    fn from(rule: &HopeRule) -> Self {
        Self {
            id: rule.id.to_string(),
            worker: rule.worker_type.to_string(),
            condition: rule.condition.clone(),
            schedule: rule.schedule.to_string(),
            priority: rule.priority.to_string(),
            status: rule.status.to_string(),
            trigger_count: rule.trigger_count,
            last_triggered: rule.last_triggered.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct RuleListOutput {
    pub rules: Vec<RuleOutput>,
    pub total: usize,
}

impl CommandOutput for RuleListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "worker", "condition", "schedule", "priority", "status", "fired"]);
        for rule in &self.rules {
            table.add_row(vec![
                rule.id.clone(),
                rule.worker.clone(),
                truncate(&rule.condition, 40),
                rule.schedule.clone(),
                rule.priority.clone(),
                rule.status.clone(),
                rule.trigger_count.to_string(),
            ]);
        }
        render_list("rule", &table, self.total)
    }
}

#[derive(Debug, Serialize)]
pub struct RuleActionOutput {
    pub success: bool,
    pub message: String,
    pub rule: RuleOutput,
}

impl CommandOutput for RuleActionOutput {
    fn to_human(&self) -> String {
        self.message.clone()
    }
}

/// A rule engine over the configured rule store. Alerts go to the log.
fn engine(config: &Config) -> Result<RuleEngine> {
    let stores: Arc<dyn StoreProvider> = store_provider(config);
    let profile = UserProfile::from_config(&config.profile).context("Invalid user profile")?;
    Ok(RuleEngine::new(
        stores.rules(),
        Arc::new(KeywordPredicate),
        NotificationRouter::new(Arc::new(TracingAlertSink) as Arc<dyn AlertSink>, profile),
        RuleEngineConfig::from(&config.rules),
    ))
}

pub async fn execute(args: RulesArgs, config: &Config, json_mode: bool) -> Result<()> {
    let engine = engine(config)?;

    match args.command {
        RulesCommands::Add {
            worker,
            condition,
            schedule,
            priority,
        } => {
            let worker = known_worker(&worker)?;
            let rule = engine
                .add_rule(&worker, &condition, schedule, priority)
                .await?;
            let out = RuleActionOutput {
                success: true,
                message: format!("Rule {} added to {worker}", rule.id),
                rule: RuleOutput::from(&rule),
            };
            output(&out, json_mode);
        }

        RulesCommands::Cancel { worker, rule_id } => {
            let worker = known_worker(&worker)?;
            let rule = engine.cancel_rule(&worker, &RuleId::new(rule_id)).await?;
            let out = RuleActionOutput {
                success: true,
                message: format!("Rule {} cancelled", rule.id),
                rule: RuleOutput::from(&rule),
            };
            output(&out, json_mode);
        }

        RulesCommands::List { worker } => {
            let rules = match worker {
                Some(worker) => engine.list_rules(&known_worker(&worker)?).await,
                None => engine.list_all_rules().await,
            };
            let out = RuleListOutput {
                total: rules.len(),
                rules: rules.iter().map(RuleOutput::from).collect(),
            };
            output(&out, json_mode);
        }
    }

    Ok(())
}
