//! Memory log entries and the per-worker header summary.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::EventType;
use super::task::{TaskId, WorkerType};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One record in a worker's memory log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub task_id: TaskId,
    pub timestamp: DateTime<Utc>,
    pub input_summary: String,
    pub output_summary: String,
    pub duration_ms: u64,
    pub success: bool,
    pub triggered: Vec<EventType>,
}

impl MemoryEntry {
    pub fn new(
        task_id: TaskId,
        input_summary: impl Into<String>,
        output_summary: impl Into<String>,
        duration_ms: u64,
        success: bool,
    ) -> Self {
        Self {
            task_id,
            timestamp: Utc::now(),
            input_summary: input_summary.into(),
            output_summary: output_summary.into(),
            duration_ms,
            success,
            triggered: Vec::new(),
        }
    }

    pub const fn status_label(&self) -> &'static str {
        if self.success {
            "SUCCESS"
        } else {
            "FAILURE"
        }
    }

    /// Render the entry as a markdown block.
    pub fn to_markdown(&self) -> String {
        let mut block = format!(
            "## [{}] Task `{}` {}\n**Input**: `{}`\n**Output**: {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.task_id.short(),
            self.status_label(),
            single_line(&self.input_summary),
            single_line(&self.output_summary),
        );
        if !self.triggered.is_empty() {
            let names: Vec<&str> = self.triggered.iter().map(EventType::as_str).collect();
            block.push_str(&format!("\n**Triggered**: {}", names.join(", ")));
        }
        block.push_str(&format!("\n**Duration**: {}ms", self.duration_ms));
        block
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}

/// Summary counters persisted in a memory log's header line.
///
/// `entries` counts the entries currently retained in the log. The task,
/// success and duration totals cover every task ever recorded for the
/// worker, including entries that have since been trimmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MemoryStats {
    pub entries: usize,
    pub tasks: u64,
    pub successes: u64,
    pub total_duration_ms: u64,
    pub updated_at: Option<DateTime<Utc>>,
}

impl MemoryStats {
    /// Fold one entry into the running totals.
    pub fn record(&mut self, entry: &MemoryEntry) {
        self.entries += 1;
        self.tasks += 1;
        if entry.success {
            self.successes += 1;
        }
        self.total_duration_ms = self.total_duration_ms.saturating_add(entry.duration_ms);
        self.updated_at = Some(entry.timestamp);
    }

    /// Success rate in percent, `0.0` when no task has been recorded.
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.tasks == 0 {
            0.0
        } else {
            self.successes as f64 * 100.0 / self.tasks as f64
        }
    }

    pub const fn avg_duration_ms(&self) -> u64 {
        if self.tasks == 0 {
            0
        } else {
            self.total_duration_ms / self.tasks
        }
    }

    /// Render the two header lines: title and summary line.
    pub fn header(&self, worker: &WorkerType) -> String {
        let updated = self.updated_at.map_or_else(
            || "never".to_string(),
            |t| t.format(TIMESTAMP_FORMAT).to_string(),
        );
        format!(
            "# {worker} - Memory Log\n_Last updated: {updated} | Entries: {} | Success rate: {:.1}% | Avg duration: {}ms | Totals: {} tasks, {} ok, {}ms_",
            self.entries,
            self.success_rate(),
            self.avg_duration_ms(),
            self.tasks,
            self.successes,
            self.total_duration_ms,
        )
    }

    /// Parse a header produced by [`MemoryStats::header`].
    ///
    /// Returns `None` when the header is missing its summary line or any
    /// counter fails to parse.
    pub fn parse_header(header: &str) -> Option<Self> {
        let mut lines = header.lines();
        if !lines.next()?.starts_with("# ") {
            return None;
        }
        let summary = lines
            .next()?
            .trim()
            .strip_prefix('_')?
            .strip_suffix('_')?;

        let mut stats = Self::default();
        let mut saw_entries = false;
        let mut saw_totals = false;
        for field in summary.split(" | ") {
            let (key, value) = field.split_once(": ")?;
            match key {
                "Last updated" => {
                    stats.updated_at = if value == "never" {
                        None
                    } else {
                        Some(
                            NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT)
                                .ok()?
                                .and_utc(),
                        )
                    };
                }
                "Entries" => {
                    stats.entries = value.parse().ok()?;
                    saw_entries = true;
                }
                "Totals" => {
                    let mut parts = value.split(", ");
                    stats.tasks = parts.next()?.strip_suffix(" tasks")?.parse().ok()?;
                    stats.successes = parts.next()?.strip_suffix(" ok")?.parse().ok()?;
                    stats.total_duration_ms =
                        parts.next()?.strip_suffix("ms")?.parse().ok()?;
                    saw_totals = true;
                }
                _ => {}
            }
        }
        if !saw_entries || !saw_totals || stats.successes > stats.tasks {
            return None;
        }
        Some(stats)
    }
}
