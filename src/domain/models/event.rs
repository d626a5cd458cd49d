//! Event model for the inter-worker event bus.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{Priority, TaskId, WorkerType};
use crate::domain::errors::DomainError;

/// Closed set of event types that workers can publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    NewContent,
    CaptionComplete,
    ClipDetected,
    ComplianceAlert,
    TrendingSpike,
    LicenseExpiring,
    ViolationDetected,
    BreakingNews,
}

impl EventType {
    pub const ALL: [Self; 8] = [
        Self::NewContent,
        Self::CaptionComplete,
        Self::ClipDetected,
        Self::ComplianceAlert,
        Self::TrendingSpike,
        Self::LicenseExpiring,
        Self::ViolationDetected,
        Self::BreakingNews,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NewContent => "NEW_CONTENT",
            Self::CaptionComplete => "CAPTION_COMPLETE",
            Self::ClipDetected => "CLIP_DETECTED",
            Self::ComplianceAlert => "COMPLIANCE_ALERT",
            Self::TrendingSpike => "TRENDING_SPIKE",
            Self::LicenseExpiring => "LICENSE_EXPIRING",
            Self::ViolationDetected => "VIOLATION_DETECTED",
            Self::BreakingNews => "BREAKING_NEWS",
        }
    }

    /// Priority given to tasks fanned out from this event.
    pub const fn task_priority(&self) -> Priority {
        match self {
            Self::ComplianceAlert | Self::BreakingNews => Priority::Critical,
            Self::ViolationDetected => Priority::High,
            Self::NewContent
            | Self::CaptionComplete
            | Self::ClipDetected
            | Self::TrendingSpike
            | Self::LicenseExpiring => Priority::Normal,
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_uppercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted)
            .ok_or_else(|| DomainError::InvalidEventType(s.to_string()))
    }
}

/// An event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub event_type: EventType,
    /// Worker whose task produced the event; `None` for external events.
    pub source_worker: Option<WorkerType>,
    pub source_task: Option<TaskId>,
    /// Data handed to every subscriber task.
    pub payload: serde_json::Value,
    /// One-line summary used in logs.
    pub summary: String,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    /// An event originating outside the worker swarm.
    pub fn external(event_type: EventType, payload: serde_json::Value) -> Self {
        let summary = super::summary::summarize_input(&payload);
        Self {
            event_type,
            source_worker: None,
            source_task: None,
            payload,
            summary,
            timestamp: Utc::now(),
        }
    }

    /// An event raised by a completed task.
    pub fn from_task(
        event_type: EventType,
        worker: WorkerType,
        task_id: TaskId,
        payload: serde_json::Value,
        summary: String,
    ) -> Self {
        Self {
            event_type,
            source_worker: Some(worker),
            source_task: Some(task_id),
            payload,
            summary,
            timestamp: Utc::now(),
        }
    }

    /// Label for the publisher, `external` when no worker raised it.
    pub fn source_label(&self) -> &str {
        self.source_worker
            .as_ref()
            .map_or("external", WorkerType::as_str)
    }

    /// Input document for a task fanned out from this event.
    pub fn task_input(&self) -> serde_json::Value {
        serde_json::json!({
            "event": self.event_type.as_str(),
            "source_worker": self.source_label(),
            "source_task": self.source_task.map(|id| id.to_string()),
            "event_data": self.payload,
        })
    }
}
