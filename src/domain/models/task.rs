//! Task domain model.
//!
//! A task is one unit of work addressed to a worker type. It moves through
//! `PENDING -> RUNNING -> SUCCEEDED | FAILED`, or `PENDING -> CANCELLED`,
//! and is never retried by the core.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::EventType;
use super::schedule::JobId;
use super::work::WorkResult;
use crate::domain::errors::DomainError;

/// Unique identifier for a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Generate a fresh, unique task id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First eight hex characters, used in logs and markdown tables.
    pub fn short(&self) -> String {
        let simple = self.0.simple().to_string();
        simple[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Name of a worker specialization, normalized to a lowercase slug.
///
/// Slugs contain only `[a-z0-9_]`, so they are safe to use as file names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct WorkerType(String);

impl WorkerType {
    pub fn new(name: impl AsRef<str>) -> Self {
        let slug = name
            .as_ref()
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == ' ' || c == '-' { '_' } else { c })
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        Self(slug)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WorkerType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for WorkerType {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<WorkerType> for String {
    fn from(w: WorkerType) -> Self {
        w.0
    }
}

/// Task priority. Higher values are dequeued first.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum Priority {
    Low = 1,
    #[default]
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl Priority {
    /// All priorities, highest first.
    pub const ALL: [Self; 4] = [Self::Critical, Self::High, Self::Normal, Self::Low];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Normal => "NORMAL",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "NORMAL" => Ok(Self::Normal),
            "HIGH" => Ok(Self::High),
            "CRITICAL" => Ok(Self::Critical),
            _ => Err(DomainError::InvalidPriority(s.to_string())),
        }
    }
}

impl TryFrom<String> for Priority {
    type Error = DomainError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Priority> for String {
    fn from(p: Priority) -> Self {
        p.as_str().to_string()
    }
}

/// Lifecycle status of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }

    /// States reachable from this one.
    pub fn valid_transitions(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[Self::Running, Self::Cancelled],
            Self::Running => &[Self::Succeeded, Self::Failed],
            Self::Succeeded | Self::Failed | Self::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: Self) -> bool {
        self.valid_transitions().contains(&next)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a task came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskOrigin {
    /// Submitted through the public API or CLI.
    External,
    /// Fired by a recurring job.
    Schedule { job_id: JobId },
    /// Fanned out from a published event.
    Event {
        event_type: EventType,
        source_task: Option<TaskId>,
    },
}

impl fmt::Display for TaskOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::External => f.write_str("external"),
            Self::Schedule { job_id } => write!(f, "schedule:{job_id}"),
            Self::Event { event_type, .. } => write!(f, "event:{event_type}"),
        }
    }
}

/// A unit of work addressed to a worker type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub worker_type: WorkerType,
    pub priority: Priority,
    pub input: serde_json::Value,
    pub status: TaskStatus,
    pub origin: TaskOrigin,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub result: Option<WorkResult>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(worker_type: WorkerType, input: serde_json::Value, priority: Priority) -> Self {
        Self {
            id: TaskId::new(),
            worker_type,
            priority,
            input,
            status: TaskStatus::Pending,
            origin: TaskOrigin::External,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            result: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: TaskOrigin) -> Self {
        self.origin = origin;
        self
    }

    fn transition(&mut self, next: TaskStatus) -> Result<(), DomainError> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::InvalidStateTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    pub fn mark_running(&mut self) -> Result<(), DomainError> {
        self.transition(TaskStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    pub fn mark_succeeded(&mut self, result: WorkResult) -> Result<(), DomainError> {
        self.transition(TaskStatus::Succeeded)?;
        self.completed_at = Some(Utc::now());
        self.result = Some(result);
        Ok(())
    }

    pub fn mark_failed(&mut self, error: impl Into<String>) -> Result<(), DomainError> {
        self.transition(TaskStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.error = Some(error.into());
        Ok(())
    }

    pub fn mark_cancelled(&mut self) -> Result<(), DomainError> {
        self.transition(TaskStatus::Cancelled)?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }
}
