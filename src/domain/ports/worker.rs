//! Worker port.

use async_trait::async_trait;
use serde_json::Value;

use super::errors::WorkerError;
use crate::domain::models::summary;
use crate::domain::models::{EventType, WorkResult, WorkerType};

/// A specialized unit that processes tasks of one worker type.
///
/// Workers are opaque to the core: it hands them an input, receives a
/// result, and reaches into the result only through the summary and
/// classification hooks below.
#[async_trait]
pub trait Worker: Send + Sync {
    /// The worker type this worker serves.
    fn worker_type(&self) -> WorkerType;

    /// Process one task input.
    async fn process(&self, input: &Value) -> Result<WorkResult, WorkerError>;

    /// Event types this worker can ever raise.
    fn emits(&self) -> Vec<EventType> {
        Vec::new()
    }

    /// Event types raised by a successful result.
    fn triggered_events(&self, _result: &WorkResult) -> Vec<EventType> {
        Vec::new()
    }

    /// One-line summary of an input, stored in memory logs.
    fn summarize_input(&self, input: &Value) -> String {
        summary::summarize_input(input)
    }

    /// One-line summary of a result, stored in memory logs.
    fn summarize_output(&self, result: &WorkResult) -> String {
        summary::summarize_output(result.data())
    }
}
