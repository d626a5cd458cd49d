//! Table-driven pass-through worker.
//!
//! Echoes the data it is given and classifies it with a [`TriggerTable`].
//! The CLI registers one per broadcast worker type so event cascades can be
//! exercised end to end without the real media workers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::models::{defaults, summary, EventType, TriggerTable, WorkResult, WorkerType};
use crate::domain::ports::{Worker, WorkerError};

pub struct PassThroughWorker {
    worker_type: WorkerType,
    triggers: Arc<TriggerTable>,
}

impl PassThroughWorker {
    pub fn new(worker_type: WorkerType, triggers: Arc<TriggerTable>) -> Self {
        Self {
            worker_type,
            triggers,
        }
    }

    /// One worker per broadcast worker type, sharing the default trigger table.
    pub fn broadcast_set() -> Vec<Arc<dyn Worker>> {
        let triggers = Arc::new(defaults::triggers());
        defaults::WORKER_TYPES
            .iter()
            .map(|name| {
                Arc::new(Self::new(WorkerType::new(name), Arc::clone(&triggers))) as Arc<dyn Worker>
            })
            .collect()
    }
}

#[async_trait]
impl Worker for PassThroughWorker {
    fn worker_type(&self) -> WorkerType {
        self.worker_type.clone()
    }

    /// Returns `input.data` when present, else `input.event_data`, else the
    /// input itself. An input with an `error` field fails.
    async fn process(&self, input: &Value) -> Result<WorkResult, WorkerError> {
        if let Some(error) = input.get("error").and_then(Value::as_str) {
            return Err(WorkerError::Failed(error.to_string()));
        }
        let data = input
            .get("data")
            .or_else(|| input.get("event_data"))
            .unwrap_or(input)
            .clone();
        Ok(WorkResult::new(data))
    }

    fn emits(&self) -> Vec<EventType> {
        self.triggers.emits(&self.worker_type)
    }

    fn triggered_events(&self, result: &WorkResult) -> Vec<EventType> {
        self.triggers.classify(&self.worker_type, result)
    }

    fn summarize_output(&self, result: &WorkResult) -> String {
        let keys = defaults::summary_keys(self.worker_type.as_str());
        if keys.is_empty() {
            summary::summarize_output(result.data())
        } else {
            summary::summarize_output_keys(result.data(), keys)
        }
    }
}
