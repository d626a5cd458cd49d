//! Domain errors for the switchboard coordination core.

use thiserror::Error;

use super::models::rule::RuleId;
use super::models::schedule::JobId;
use super::models::task::{TaskId, TaskStatus};
use super::ports::errors::StoreError;

/// Format a cycle path as a human-readable string: `A -> b -> A`.
fn format_cycle_path(path: &[String]) -> String {
    path.join(" -> ")
}

/// Domain-level errors raised by the public coordination API.
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("Unknown worker type: {0}")]
    UnknownWorkerType(String),

    #[error("Invalid priority: {0} (expected CRITICAL, HIGH, NORMAL or LOW)")]
    InvalidPriority(String),

    #[error("Invalid event type: {0}")]
    InvalidEventType(String),

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error("Task {id} cannot be cancelled while {status}")]
    TaskNotPending { id: TaskId, status: TaskStatus },

    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: TaskStatus, to: TaskStatus },

    #[error("Scheduled job not found: {0}")]
    JobNotFound(JobId),

    #[error("Scheduled job already registered: {0}")]
    DuplicateJob(JobId),

    #[error("Invalid schedule interval: {0}")]
    InvalidInterval(String),

    #[error("Rule not found: {0}")]
    RuleNotFound(RuleId),

    #[error("Rule {0} is already inactive")]
    RuleInactive(RuleId),

    #[error("Invalid rule: {0}")]
    InvalidRule(String),

    #[error("Invalid timezone: {0} (expected UTC or an offset such as +05:30)")]
    InvalidTimezone(String),

    #[error("Subscription cycle detected: {}", format_cycle_path(.0))]
    SubscriptionCycle(Vec<String>),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Errors raised by a worker's memory log.
#[derive(Debug, Error)]
pub enum MemoryLogError {
    #[error("Memory store error: {0}")]
    Store(#[from] StoreError),

    #[error("Nothing to amend: no entry has been appended since the log was opened")]
    NothingToAmend,

    #[error("Entry for task {0} has already been amended")]
    AlreadyAmended(TaskId),

    #[error("Last entry belongs to task {found}, not {expected}")]
    AmendMismatch { expected: TaskId, found: TaskId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_error_formats_path() {
        let err = DomainError::SubscriptionCycle(vec![
            "BREAKING_NEWS".to_string(),
            "trending".to_string(),
            "BREAKING_NEWS".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Subscription cycle detected: BREAKING_NEWS -> trending -> BREAKING_NEWS"
        );
    }

    #[test]
    fn test_not_pending_mentions_status() {
        let id = TaskId::new();
        let err = DomainError::TaskNotPending {
            id,
            status: TaskStatus::Running,
        };
        assert!(err.to_string().contains("RUNNING"));
    }
}
