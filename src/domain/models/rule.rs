//! Standing alert rules ("when X happens, tell me").

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task::{Priority, WorkerType};
use crate::domain::errors::DomainError;

/// Rule identifier, unique within a worker: `hope_001`, `hope_002`, ...
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuleId(String);

impl RuleId {
    const PREFIX: &'static str = "hope_";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_sequence(n: u32) -> Self {
        Self(format!("{}{n:03}", Self::PREFIX))
    }

    /// Numeric suffix, if the id has the generated form.
    pub fn sequence(&self) -> Option<u32> {
        self.0.strip_prefix(Self::PREFIX)?.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// When a matching rule is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RuleSchedule {
    /// Deliver as soon as a task matches.
    Immediate,
    /// Bundle matches into one digest per local day at the given hour.
    Daily { hour: u8 },
}

impl fmt::Display for RuleSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate => f.write_str("IMMEDIATE"),
            Self::Daily { hour } => write!(f, "DAILY@{hour:02}"),
        }
    }
}

impl FromStr for RuleSchedule {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_uppercase();
        if upper == "IMMEDIATE" {
            return Ok(Self::Immediate);
        }
        let hour = upper
            .strip_prefix("DAILY@")
            .or_else(|| upper.strip_prefix("DAILY:"))
            .and_then(|h| h.parse::<u8>().ok())
            .filter(|h| *h < 24)
            .ok_or_else(|| {
                DomainError::InvalidRule(format!(
                    "schedule '{s}' must be IMMEDIATE or DAILY@<hour 0-23>"
                ))
            })?;
        Ok(Self::Daily { hour })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleStatus {
    Active,
    Inactive,
}

impl RuleStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl fmt::Display for RuleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RuleStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            other => Err(DomainError::InvalidRule(format!("unknown rule status '{other}'"))),
        }
    }
}

/// A persisted standing rule attached to one worker type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopeRule {
    pub id: RuleId,
    pub worker_type: WorkerType,
    pub condition: String,
    pub schedule: RuleSchedule,
    pub priority: Priority,
    pub status: RuleStatus,
    pub created_at: DateTime<Utc>,
    pub trigger_count: u64,
    pub last_triggered: Option<DateTime<Utc>>,
}

impl HopeRule {
    pub fn new(
        id: RuleId,
        worker_type: WorkerType,
        condition: &str,
        schedule: RuleSchedule,
        priority: Priority,
    ) -> Result<Self, DomainError> {
        let condition = condition.split_whitespace().collect::<Vec<_>>().join(" ");
        if condition.is_empty() {
            return Err(DomainError::InvalidRule(
                "condition must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id,
            worker_type,
            condition,
            schedule,
            priority,
            status: RuleStatus::Active,
            created_at: Utc::now(),
            trigger_count: 0,
            last_triggered: None,
        })
    }

    pub fn is_active(&self) -> bool {
        self.status == RuleStatus::Active
    }

    pub fn record_trigger(&mut self, at: DateTime<Utc>) {
        self.trigger_count += 1;
        self.last_triggered = Some(at);
    }
}

/// Local-time window during which non-critical alerts are held back.
///
/// `start_hour > end_hour` wraps past midnight (23 to 7 covers
/// 23:00-06:59). Equal hours disable the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl QuietHours {
    pub const fn new(start_hour: u8, end_hour: u8) -> Self {
        Self {
            start_hour,
            end_hour,
        }
    }

    pub const fn contains(&self, hour: u8) -> bool {
        if self.start_hour == self.end_hour {
            false
        } else if self.start_hour < self.end_hour {
            hour >= self.start_hour && hour < self.end_hour
        } else {
            hour >= self.start_hour || hour < self.end_hour
        }
    }
}
