use std::time::Duration;

use thiserror::Error;

/// Storage errors raised by log, rule and snapshot stores
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store not found: {0}")]
    NotFound(String),

    #[error("Corrupt store {location}: {reason}")]
    Corrupt { location: String, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn io(path: impl std::fmt::Display, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_string(),
            source,
        }
    }

    pub fn corrupt(location: impl std::fmt::Display, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            location: location.to_string(),
            reason: reason.into(),
        }
    }

    /// The document is gone or unreadable and may be recreated empty.
    pub const fn is_missing_or_corrupt(&self) -> bool {
        matches!(self, Self::NotFound(_) | Self::Corrupt { .. })
    }
}

/// Failure reported by a worker's `process` call
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Worker failed: {0}")]
    Failed(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Task timed out after {0:?}")]
    Timeout(Duration),

    #[error("No worker registered for type {0}")]
    Unavailable(String),
}

/// Alert delivery errors
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("Channel {channel} rejected delivery: {reason}")]
    Rejected { channel: String, reason: String },

    #[error("Delivery transport error: {0}")]
    Transport(String),
}
