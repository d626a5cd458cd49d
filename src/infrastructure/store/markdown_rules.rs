//! Markdown table persistence for standing rules, one file per worker.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use crate::domain::models::{HopeRule, Priority, RuleId, RuleSchedule, RuleStatus, WorkerType};
use crate::domain::ports::{RuleStore, StoreError};

const TABLE_HEADER: &str =
    "| ID | Status | Schedule | Priority | Created | Triggers | Last Triggered | Condition |";
const TABLE_RULE: &str =
    "|----|--------|----------|----------|---------|----------|----------------|-----------|";
const COLUMNS: usize = 8;

pub struct MarkdownRuleStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl MarkdownRuleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    fn path_for(&self, worker: &WorkerType) -> PathBuf {
        self.dir.join(format!("{worker}.md"))
    }
}

fn render(worker: &WorkerType, rules: &[HopeRule]) -> String {
    let active = rules.iter().filter(|r| r.is_active()).count();
    let mut out = format!(
        "# Standing Rules - {worker}\n_Rules: {} | Active: {active}_\n\n{TABLE_HEADER}\n{TABLE_RULE}\n",
        rules.len()
    );
    for rule in rules {
        let last = rule
            .last_triggered
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {} | {} | {} |\n",
            rule.id,
            rule.status,
            rule.schedule,
            rule.priority,
            rule.created_at.to_rfc3339(),
            rule.trigger_count,
            last,
            rule.condition,
        ));
    }
    out
}

fn parse_time(field: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(field)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn parse_row(worker: &WorkerType, line: &str) -> Result<HopeRule, String> {
    let inner = line
        .trim()
        .strip_prefix("| ")
        .and_then(|l| l.strip_suffix(" |"))
        .ok_or_else(|| format!("malformed row: {line}"))?;
    // The condition is the last column and may itself contain " | ".
    let cols: Vec<&str> = inner.splitn(COLUMNS, " | ").collect();
    if cols.len() != COLUMNS {
        return Err(format!("expected {COLUMNS} columns: {line}"));
    }

    let status: RuleStatus = cols[1].parse().map_err(|e| format!("{e}"))?;
    let schedule: RuleSchedule = cols[2].parse().map_err(|e| format!("{e}"))?;
    let priority: Priority = cols[3].parse().map_err(|e| format!("{e}"))?;
    let created_at = parse_time(cols[4]).ok_or_else(|| format!("bad timestamp '{}'", cols[4]))?;
    let trigger_count: u64 = cols[5]
        .parse()
        .map_err(|_| format!("bad trigger count '{}'", cols[5]))?;
    let last_triggered = match cols[6] {
        "-" => None,
        other => Some(parse_time(other).ok_or_else(|| format!("bad timestamp '{other}'"))?),
    };

    Ok(HopeRule {
        id: RuleId::new(cols[0]),
        worker_type: worker.clone(),
        condition: cols[7].to_string(),
        schedule,
        priority,
        status,
        created_at,
        trigger_count,
        last_triggered,
    })
}

fn parse(worker: &WorkerType, text: &str) -> Result<Vec<HopeRule>, String> {
    let mut lines = text.lines();
    if !lines.by_ref().any(|l| l.trim() == TABLE_HEADER) {
        return Err("missing rule table header".to_string());
    }
    if lines.next().map(str::trim) != Some(TABLE_RULE) {
        return Err("missing rule table separator".to_string());
    }
    lines
        .filter(|l| !l.trim().is_empty())
        .map(|l| parse_row(worker, l))
        .collect()
}

#[async_trait]
impl RuleStore for MarkdownRuleStore {
    async fn load(&self, worker: &WorkerType) -> Result<Vec<HopeRule>, StoreError> {
        let _guard = self.lock.lock().await;
        let path = self.path_for(worker);
        let text = match tokio::fs::read_to_string(&path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(StoreError::corrupt(path.display(), e.to_string()))
            }
            Err(e) => return Err(StoreError::io(path.display(), e)),
        };
        parse(worker, &text).map_err(|reason| StoreError::corrupt(path.display(), reason))
    }

    async fn save(&self, worker: &WorkerType, rules: &[HopeRule]) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(self.dir.display(), e))?;
        let path = self.path_for(worker);
        let tmp = self.dir.join(format!(".{worker}.md.tmp"));
        tokio::fs::write(&tmp, render(worker, rules))
            .await
            .map_err(|e| StoreError::io(tmp.display(), e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| StoreError::io(path.display(), e))
    }

    async fn workers(&self) -> Result<Vec<WorkerType>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(self.dir.display(), e)),
        };
        let mut workers = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(self.dir.display(), e))?
        {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "md") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    workers.push(WorkerType::new(stem));
                }
            }
        }
        workers.sort();
        Ok(workers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn rule(n: u32, condition: &str) -> HopeRule {
        HopeRule::new(
            RuleId::from_sequence(n),
            WorkerType::new("compliance"),
            condition,
            RuleSchedule::Immediate,
            Priority::High,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = MarkdownRuleStore::new(dir.path());
        let worker = WorkerType::new("compliance");

        let mut first = rule(1, "critical violation | loudness");
        first.record_trigger(Utc::now());
        let mut second = rule(2, "caption drift");
        second.status = RuleStatus::Inactive;
        second.schedule = RuleSchedule::Daily { hour: 8 };

        store.save(&worker, &[first.clone(), second.clone()]).await.unwrap();
        let loaded = store.load(&worker).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, first.id);
        assert_eq!(loaded[0].condition, "critical violation | loudness");
        assert_eq!(loaded[0].trigger_count, 1);
        assert!(loaded[0].last_triggered.is_some());
        assert_eq!(loaded[1].status, RuleStatus::Inactive);
        assert_eq!(loaded[1].schedule, RuleSchedule::Daily { hour: 8 });

        assert_eq!(store.workers().await.unwrap(), vec![worker]);
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = MarkdownRuleStore::new(dir.path().join("rules"));
        assert!(store.load(&WorkerType::new("clip")).await.unwrap().is_empty());
        assert!(store.workers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_garbage_is_corrupt() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("clip.md"), "not a rule table").unwrap();
        let store = MarkdownRuleStore::new(dir.path());
        assert!(matches!(
            store.load(&WorkerType::new("clip")).await,
            Err(StoreError::Corrupt { .. })
        ));
    }

    #[tokio::test]
    async fn test_bad_row_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let text = format!("# Standing Rules - clip\n\n{TABLE_HEADER}\n{TABLE_RULE}\n| hope_001 | MAYBE | x |\n");
        std::fs::write(dir.path().join("clip.md"), text).unwrap();
        let store = MarkdownRuleStore::new(dir.path());
        assert!(store.load(&WorkerType::new("clip")).await.is_err());
    }
}
