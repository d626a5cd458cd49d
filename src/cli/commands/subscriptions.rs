//! `switchboard subscriptions`: the default subscription table and its
//! acyclicity verdict.

use anyhow::Result;
use serde::Serialize;

use crate::cli::output::{list_table, output, CommandOutput};
use crate::domain::models::{defaults, EventType};

#[derive(Debug, Serialize)]
pub struct SubscriptionRow {
    pub event: EventType,
    pub priority: String,
    pub subscribers: Vec<String>,
    pub emitted_by: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SubscriptionsOutput {
    pub subscriptions: Vec<SubscriptionRow>,
    pub acyclic: bool,
    pub cycle: Option<String>,
}

impl CommandOutput for SubscriptionsOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["event", "priority", "subscribers", "emitted by"]);
        for row in &self.subscriptions {
            table.add_row(vec![
                row.event.to_string(),
                row.priority.clone(),
                row.subscribers.join(", "),
                row.emitted_by.join(", "),
            ]);
        }
        let verdict = match &self.cycle {
            None => "Subscription graph is acyclic.".to_string(),
            Some(cycle) => format!("Subscription graph has a cycle: {cycle}"),
        };
        format!("{table}\n\n{verdict}")
    }
}

/// Build the report for the default tables.
pub fn report() -> SubscriptionsOutput {
    let table = defaults::subscriptions();
    let emits = defaults::triggers().emits_map();

    let subscriptions = EventType::ALL
        .iter()
        .map(|event| {
            let mut emitted_by: Vec<String> = emits
                .iter()
                .filter(|(_, events)| events.contains(event))
                .map(|(worker, _)| worker.to_string())
                .collect();
            emitted_by.sort();
            SubscriptionRow {
                event: *event,
                priority: event.task_priority().to_string(),
                subscribers: table
                    .subscribers(*event)
                    .iter()
                    .map(ToString::to_string)
                    .collect(),
                emitted_by,
            }
        })
        .collect();

    let cycle = table
        .check_acyclic(&EventType::ALL, &emits)
        .err()
        .map(|e| e.to_string());
    SubscriptionsOutput {
        subscriptions,
        acyclic: cycle.is_none(),
        cycle,
    }
}

pub fn execute(json_mode: bool) -> Result<()> {
    output(&report(), json_mode);
    Ok(())
}
