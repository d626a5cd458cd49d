//! Audit logging service for observability.
//!
//! Records every completed task in the global task history table and every
//! published event in the inter-agent communications log, and keeps the
//! newest entries in memory for the system snapshot. Failures are logged
//! and never reach the caller.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::models::{Event, MemoryConfig, Task};
use crate::domain::ports::LogStore;
use crate::services::event_bus::PublishReport;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const TASK_HISTORY_HEADER: &str = "# Task History\n\n| Timestamp | Agent | Task ID | Status | Duration |\n|-----------|-------|---------|--------|----------|";
const INTER_AGENT_HEADER: &str = "# Inter-Agent Communications";

/// Configuration for the audit log service.
#[derive(Debug, Clone, Copy)]
pub struct AuditLogConfig {
    /// Rows allowed in the task history before it is trimmed.
    pub task_history_max: usize,
    /// Entries allowed in the communications log before it is trimmed.
    pub inter_agent_max: usize,
    /// Maximum entries to keep in memory.
    pub recent_capacity: usize,
}

impl Default for AuditLogConfig {
    fn default() -> Self {
        Self::from(&MemoryConfig::default())
    }
}

impl From<&MemoryConfig> for AuditLogConfig {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            task_history_max: config.task_history_max_entries,
            inter_agent_max: config.inter_agent_max_entries,
            recent_capacity: 200,
        }
    }
}

impl AuditLogConfig {
    /// Rows kept when the task history is trimmed: 500 below the cap, at
    /// least 100.
    pub fn task_history_keep(&self) -> usize {
        self.task_history_max
            .saturating_sub(500)
            .max(100)
            .min(self.task_history_max)
    }

    /// Entries kept when the communications log is trimmed: 200 below the
    /// cap, at least 100.
    pub fn inter_agent_keep(&self) -> usize {
        self.inter_agent_max
            .saturating_sub(200)
            .max(100)
            .min(self.inter_agent_max)
    }
}

/// Category of audit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditCategory {
    Task,
    Event,
}

impl AuditCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Event => "event",
        }
    }
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub timestamp: DateTime<Utc>,
    pub category: AuditCategory,
    /// Worker type for tasks, event type for events.
    pub subject: String,
    pub detail: String,
}

impl AuditEntry {
    pub fn to_line(&self) -> String {
        format!(
            "[{}] {} {}: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.category.as_str(),
            self.subject,
            self.detail
        )
    }
}

#[derive(Debug, Default)]
struct AuditState {
    recent: VecDeque<AuditEntry>,
    history_rows: usize,
    comms_entries: usize,
}

/// Audit log service.
pub struct AuditLogService {
    config: AuditLogConfig,
    task_history: Arc<dyn LogStore>,
    inter_agent: Arc<dyn LogStore>,
    state: Mutex<AuditState>,
}

impl AuditLogService {
    /// Open both logs, writing their headers when missing or unreadable.
    pub async fn open(
        config: AuditLogConfig,
        task_history: Arc<dyn LogStore>,
        inter_agent: Arc<dyn LogStore>,
    ) -> Self {
        let history_rows = ensure_header(task_history.as_ref(), TASK_HISTORY_HEADER, "# Task History").await;
        let comms_entries =
            ensure_header(inter_agent.as_ref(), INTER_AGENT_HEADER, INTER_AGENT_HEADER).await;
        Self {
            config,
            task_history,
            inter_agent,
            state: Mutex::new(AuditState {
                recent: VecDeque::with_capacity(config.recent_capacity),
                history_rows,
                comms_entries,
            }),
        }
    }

    /// Record a task that reached a terminal status.
    pub async fn record_task(&self, task: &Task, duration_ms: u64) {
        let row = format!(
            "| {} | {} | {} | {} | {}ms |",
            task.completed_at
                .unwrap_or_else(Utc::now)
                .format(TIMESTAMP_FORMAT),
            task.worker_type,
            task.id.short(),
            task.status,
            duration_ms
        );
        let detail = match &task.error {
            Some(error) => format!("{} {} ({}) in {duration_ms}ms: {error}", task.id.short(), task.status, task.origin),
            None => format!("{} {} ({}) in {duration_ms}ms", task.id.short(), task.status, task.origin),
        };

        let mut state = self.state.lock().await;
        match self.task_history.append(&row).await {
            Ok(()) => {
                state.history_rows += 1;
                if state.history_rows > self.config.task_history_max {
                    let keep = self.config.task_history_keep();
                    match self.task_history.retain_recent(keep).await {
                        Ok(dropped) => {
                            debug!(dropped, "Task history trimmed");
                            state.history_rows = keep;
                        }
                        Err(e) => warn!(error = %e, "Task history trim failed"),
                    }
                }
            }
            Err(e) => warn!(task_id = %task.id, error = %e, "Failed to write task history"),
        }
        self.push(
            &mut state,
            AuditEntry {
                timestamp: Utc::now(),
                category: AuditCategory::Task,
                subject: task.worker_type.to_string(),
                detail,
            },
        );
    }

    /// Record a published event and the tasks it produced.
    pub async fn record_event(&self, event: &Event, report: &PublishReport) {
        let subscribers: Vec<&str> = report.subscribers().into_iter().map(|w| w.as_str()).collect();
        let subscriber_list = if subscribers.is_empty() {
            "none".to_string()
        } else {
            subscribers.join(", ")
        };
        let source = match event.source_task {
            Some(id) => format!("{} (task `{}`)", event.source_label(), id.short()),
            None => event.source_label().to_string(),
        };
        let block = format!(
            "## [{}] {}\n**Source**: {source}\n**Subscribers**: {subscriber_list}\n**Payload**: {}\n**Tasks queued**: {}",
            event.timestamp.format(TIMESTAMP_FORMAT),
            event.event_type,
            event.summary.replace(['\n', '\r'], " "),
            report.queued.len()
        );

        let mut state = self.state.lock().await;
        match self.inter_agent.append(&block).await {
            Ok(()) => {
                state.comms_entries += 1;
                if state.comms_entries > self.config.inter_agent_max {
                    let keep = self.config.inter_agent_keep();
                    match self.inter_agent.retain_recent(keep).await {
                        Ok(_) => state.comms_entries = keep,
                        Err(e) => warn!(error = %e, "Communications log trim failed"),
                    }
                }
            }
            Err(e) => warn!(event = %event.event_type, error = %e, "Failed to write communications log"),
        }
        self.push(
            &mut state,
            AuditEntry {
                timestamp: event.timestamp,
                category: AuditCategory::Event,
                subject: event.event_type.to_string(),
                detail: format!(
                    "from {} -> {subscriber_list} ({} queued)",
                    event.source_label(),
                    report.queued.len()
                ),
            },
        );
    }

    fn push(&self, state: &mut AuditState, entry: AuditEntry) {
        if state.recent.len() >= self.config.recent_capacity {
            state.recent.pop_front();
        }
        state.recent.push_back(entry);
    }

    /// The newest `n` entries, oldest first.
    pub async fn recent(&self, n: usize) -> Vec<AuditEntry> {
        let state = self.state.lock().await;
        let skip = state.recent.len().saturating_sub(n);
        state.recent.iter().skip(skip).cloned().collect()
    }
}

/// Make sure a log exists with a recognizable header. Returns its entry count.
async fn ensure_header(store: &dyn LogStore, header: &str, title: &str) -> usize {
    match store.read_header().await {
        Ok(Some(existing)) if existing.starts_with(title) => match store.len().await {
            Ok(len) => return len,
            Err(e) => warn!(error = %e, "Could not count audit log entries"),
        },
        Ok(Some(_)) => warn!(title, "Audit log header unrecognized, recreating"),
        Ok(None) => {}
        Err(e) => warn!(title, error = %e, "Audit log unreadable, recreating"),
    }
    if let Err(e) = store.reset(header).await {
        warn!(title, error = %e, "Failed to create audit log");
    }
    0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{EventType, Priority, TaskId, WorkResult, WorkerType};
    use crate::infrastructure::store::InMemoryLogStore;
    use serde_json::json;

    fn finished_task(worker: &str) -> Task {
        let mut task = Task::new(WorkerType::new(worker), json!({}), Priority::Normal);
        task.mark_running().unwrap();
        task.mark_succeeded(WorkResult::new(json!({}))).unwrap();
        task
    }

    async fn service(
        config: AuditLogConfig,
    ) -> (AuditLogService, Arc<InMemoryLogStore>, Arc<InMemoryLogStore>) {
        let history = Arc::new(InMemoryLogStore::new());
        let comms = Arc::new(InMemoryLogStore::new());
        let svc = AuditLogService::open(
            config,
            Arc::clone(&history) as Arc<dyn LogStore>,
            Arc::clone(&comms) as Arc<dyn LogStore>,
        )
        .await;
        (svc, history, comms)
    }

    #[test]
    fn test_keep_sizes() {
        let config = AuditLogConfig {
            task_history_max: 2000,
            inter_agent_max: 1000,
            recent_capacity: 10,
        };
        assert_eq!(config.task_history_keep(), 1500);
        assert_eq!(config.inter_agent_keep(), 800);

        let small = AuditLogConfig {
            task_history_max: 300,
            inter_agent_max: 250,
            recent_capacity: 10,
        };
        assert_eq!(small.task_history_keep(), 100);
        assert_eq!(small.inter_agent_keep(), 100);
    }

    #[tokio::test]
    async fn test_task_rows_are_written() {
        let (svc, history, _) = service(AuditLogConfig::default()).await;
        assert!(history.header().unwrap().contains("| Timestamp | Agent |"));

        let task = finished_task("caption");
        svc.record_task(&task, 42).await;
        let rows = history.blocks();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].contains("| caption |"));
        assert!(rows[0].contains(&task.id.short()));
        assert!(rows[0].ends_with("| SUCCEEDED | 42ms |"));

        let recent = svc.recent(5).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].category, AuditCategory::Task);
    }

    #[tokio::test]
    async fn test_task_history_trims_to_floor() {
        let config = AuditLogConfig {
            task_history_max: 120,
            inter_agent_max: 1000,
            recent_capacity: 5,
        };
        let (svc, history, _) = service(config).await;
        for _ in 0..121 {
            svc.record_task(&finished_task("clip"), 1).await;
        }
        assert_eq!(history.blocks().len(), 100);
        assert_eq!(svc.recent(50).await.len(), 5);
    }

    #[tokio::test]
    async fn test_event_entry_lists_subscribers() {
        let (svc, _, comms) = service(AuditLogConfig::default()).await;
        let event = Event::from_task(
            EventType::ClipDetected,
            WorkerType::new("clip"),
            TaskId::new(),
            json!({"viral_moments": [1]}),
            "viral_moments=1".to_string(),
        );
        let report = PublishReport {
            event_type: Some(EventType::ClipDetected),
            queued: vec![(WorkerType::new("social"), TaskId::new())],
            rejected: vec![],
        };
        svc.record_event(&event, &report).await;

        let blocks = comms.blocks();
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].contains("CLIP_DETECTED"));
        assert!(blocks[0].contains("**Subscribers**: social"));
        assert!(blocks[0].contains("**Tasks queued**: 1"));
        assert!(blocks[0].contains("**Source**: clip (task `"));
    }

    #[tokio::test]
    async fn test_existing_logs_are_kept() {
        let history = Arc::new(InMemoryLogStore::with_header(TASK_HISTORY_HEADER));
        history.append("| row |").await.unwrap();
        let comms = Arc::new(InMemoryLogStore::with_header("not a comms log"));
        let _svc = AuditLogService::open(
            AuditLogConfig::default(),
            Arc::clone(&history) as Arc<dyn LogStore>,
            Arc::clone(&comms) as Arc<dyn LogStore>,
        )
        .await;
        assert_eq!(history.blocks().len(), 1);
        assert_eq!(comms.header().unwrap(), INTER_AGENT_HEADER);
    }
}
