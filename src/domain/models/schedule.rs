//! Recurring job domain model.
//!
//! A job fires on a fixed grid anchored at its registration time:
//! `next_run` only ever moves forward by exactly one interval, so the
//! time a tick takes to run never accumulates as drift.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::{Priority, WorkerType};
use crate::domain::errors::{DomainError, DomainResult};

/// Identifier of a scheduled job.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(String);

impl JobId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generated id of the form `job_1a2b3c4d`.
    pub fn generate() -> Self {
        let simple = Uuid::new_v4().simple().to_string();
        Self(format!("job_{}", &simple[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A recurring task template.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJob {
    pub id: JobId,
    pub worker_type: WorkerType,
    pub input: serde_json::Value,
    pub priority: Priority,
    pub interval: Duration,
    pub next_run: DateTime<Utc>,
    pub last_run: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub enabled: bool,
    #[serde(skip)]
    step: chrono::Duration,
}

impl ScheduledJob {
    /// Create a job whose first run is one interval after `now`.
    pub fn new(
        id: JobId,
        worker_type: WorkerType,
        interval: Duration,
        priority: Priority,
        input: serde_json::Value,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if interval.is_zero() {
            return Err(DomainError::InvalidInterval(
                "interval must be greater than zero".to_string(),
            ));
        }
        let step = chrono::Duration::from_std(interval)
            .map_err(|e| DomainError::InvalidInterval(e.to_string()))?;
        let next_run = now
            .checked_add_signed(step)
            .ok_or_else(|| DomainError::InvalidInterval(format!("{interval:?} overflows")))?;

        Ok(Self {
            id,
            worker_type,
            input,
            priority,
            interval,
            next_run,
            last_run: None,
            run_count: 0,
            enabled: true,
            step,
        })
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.enabled && self.next_run <= now
    }

    /// Record a fire at `now` and move `next_run` forward one interval.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.last_run = Some(now);
        self.run_count += 1;
        self.next_run += self.step;
    }

    /// Move `next_run` to the first grid point strictly after `now`.
    ///
    /// Used when a paused job is resumed so that the missed runs are skipped
    /// rather than replayed in a burst.
    pub fn realign(&mut self, now: DateTime<Utc>) {
        if self.next_run > now {
            return;
        }
        let step_ms = self.step.num_milliseconds().max(1);
        let behind_ms = (now - self.next_run).num_milliseconds();
        let skipped = behind_ms / step_ms + 1;
        self.next_run += chrono::Duration::milliseconds(skipped * step_ms);
    }
}
