//! Periodic system snapshot.
//!
//! The snapshot is rebuilt from live state and rewritten in full; readers
//! may see a snapshot that is up to one interval old.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::domain::models::{EventType, JobId, Priority, WorkerType};
use crate::domain::ports::LogStore;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CounterSnapshot {
    pub tasks_processed: u64,
    pub tasks_failed: u64,
    pub events_triggered: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: JobId,
    pub worker_type: WorkerType,
    pub interval_secs: u64,
    pub priority: Priority,
    pub next_run: DateTime<Utc>,
    pub run_count: u64,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    pub worker_type: WorkerType,
    pub emits: Vec<EventType>,
    pub memory_entries: usize,
    pub tasks: u64,
    pub success_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemSnapshot {
    pub generated_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub running: bool,
    pub queue_depth: usize,
    pub running_tasks: usize,
    pub counters: CounterSnapshot,
    pub jobs: Vec<JobSummary>,
    pub workers: Vec<WorkerSummary>,
    pub recent_audit: Vec<String>,
}

impl SystemSnapshot {
    pub fn uptime_secs(&self) -> i64 {
        (self.generated_at - self.started_at).num_seconds().max(0)
    }

    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "# System State\n_Generated: {} | Uptime: {}s | Running: {}_\n\n## Queue\n- Pending: {}\n- Running: {}\n- Processed: {}\n- Failed: {}\n- Events triggered: {}\n",
            self.generated_at.format(TIMESTAMP_FORMAT),
            self.uptime_secs(),
            if self.running { "yes" } else { "no" },
            self.queue_depth,
            self.running_tasks,
            self.counters.tasks_processed,
            self.counters.tasks_failed,
            self.counters.events_triggered,
        );

        out.push_str("\n## Scheduled Jobs\n");
        if self.jobs.is_empty() {
            out.push_str("_none_\n");
        } else {
            out.push_str("| Job | Agent | Every | Next run | Runs | State |\n|-----|-------|-------|----------|------|-------|\n");
            for job in &self.jobs {
                out.push_str(&format!(
                    "| {} | {} | {}s | {} | {} | {} |\n",
                    job.id,
                    job.worker_type,
                    job.interval_secs,
                    job.next_run.format(TIMESTAMP_FORMAT),
                    job.run_count,
                    if job.enabled { "enabled" } else { "paused" },
                ));
            }
        }

        out.push_str("\n## Workers\n");
        for worker in &self.workers {
            let emits: Vec<&str> = worker.emits.iter().map(EventType::as_str).collect();
            out.push_str(&format!(
                "- **{}**: {} entries, {} tasks, {:.1}% ok{}\n",
                worker.worker_type,
                worker.memory_entries,
                worker.tasks,
                worker.success_rate,
                if emits.is_empty() {
                    String::new()
                } else {
                    format!(", emits {}", emits.join(", "))
                },
            ));
        }

        out.push_str("\n## Recent Activity\n");
        if self.recent_audit.is_empty() {
            out.push_str("_none_\n");
        }
        for line in &self.recent_audit {
            out.push_str(&format!("- {line}\n"));
        }
        out
    }
}

/// Rewrite the snapshot document. Failures are logged.
pub async fn write_snapshot(store: &dyn LogStore, snapshot: &SystemSnapshot) -> bool {
    match store.reset(&snapshot.to_markdown()).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "Failed to write system snapshot");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::store::InMemoryLogStore;

    fn snapshot() -> SystemSnapshot {
        let now = Utc::now();
        SystemSnapshot {
            generated_at: now,
            started_at: now - chrono::TimeDelta::seconds(90),
            running: true,
            queue_depth: 3,
            running_tasks: 1,
            counters: CounterSnapshot {
                tasks_processed: 10,
                tasks_failed: 2,
                events_triggered: 4,
            },
            jobs: vec![JobSummary {
                id: JobId::new("job_trending"),
                worker_type: WorkerType::new("trending"),
                interval_secs: 300,
                priority: Priority::Normal,
                next_run: now,
                run_count: 7,
                enabled: false,
            }],
            workers: vec![WorkerSummary {
                worker_type: WorkerType::new("clip"),
                emits: vec![EventType::ClipDetected],
                memory_entries: 5,
                tasks: 6,
                success_rate: 83.33,
            }],
            recent_audit: vec!["task caption ok".to_string()],
        }
    }

    #[test]
    fn test_markdown_sections() {
        let md = snapshot().to_markdown();
        assert!(md.starts_with("# System State\n"));
        assert!(md.contains("Uptime: 90s"));
        assert!(md.contains("- Pending: 3"));
        assert!(md.contains("| job_trending | trending | 300s |"));
        assert!(md.contains("| 7 | paused |"));
        assert!(md.contains("- **clip**: 5 entries, 6 tasks, 83.3% ok, emits CLIP_DETECTED"));
        assert!(md.contains("- task caption ok"));
    }

    #[tokio::test]
    async fn test_write_replaces_document() {
        let store = InMemoryLogStore::new();
        assert!(write_snapshot(&store, &snapshot()).await);
        let mut second = snapshot();
        second.queue_depth = 0;
        assert!(write_snapshot(&store, &second).await);
        let header = store.header().unwrap();
        assert!(header.contains("- Pending: 0"));
        assert!(store.blocks().is_empty());
    }
}
