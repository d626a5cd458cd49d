//! Opaque worker results.

use serde::{Deserialize, Serialize};

/// Structured data produced by a worker.
///
/// The core never inspects it directly; it only reaches the data through a
/// worker's summary and event-classification hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WorkResult(serde_json::Value);

impl WorkResult {
    pub const fn new(data: serde_json::Value) -> Self {
        Self(data)
    }

    pub const fn data(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_data(self) -> serde_json::Value {
        self.0
    }
}

impl From<serde_json::Value> for WorkResult {
    fn from(data: serde_json::Value) -> Self {
        Self(data)
    }
}
