//! Store adapters
//!
//! Markdown files under a memory directory for production use, and
//! in-memory equivalents for tests and memory-less runs.
//!
//! On-disk layout:
//! - `agents/<worker>.md`: per-worker memory log
//! - `agents/task_history.md`: global task table
//! - `agents/inter_agent_comms.md`: inter-worker event log
//! - `system/system_state.md`: periodic snapshot
//! - `rules/<worker>.md`: standing rules

pub mod in_memory;
pub mod markdown_log;
pub mod markdown_rules;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::models::WorkerType;
use crate::domain::ports::{LogStore, RuleStore, StoreProvider};

pub use in_memory::{InMemoryLogStore, InMemoryRuleStore, InMemoryStoreProvider};
pub use markdown_log::{Layout, MarkdownLogStore, SECTION_SEPARATOR};
pub use markdown_rules::MarkdownRuleStore;

/// Header lines of the task history table.
pub const TASK_HISTORY_HEADER_LINES: usize = 4;

/// File names inside the memory directory.
pub const TASK_HISTORY_FILE: &str = "agents/task_history.md";
pub const INTER_AGENT_FILE: &str = "agents/inter_agent_comms.md";
pub const SNAPSHOT_FILE: &str = "system/system_state.md";

/// Builds markdown stores rooted at one memory directory.
pub struct MarkdownStoreProvider {
    root: PathBuf,
    rules: Arc<MarkdownRuleStore>,
}

impl MarkdownStoreProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let rules = Arc::new(MarkdownRuleStore::new(root.join("rules")));
        Self { root, rules }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.root.join(SNAPSHOT_FILE)
    }
}

impl StoreProvider for MarkdownStoreProvider {
    fn agent_log(&self, worker: &WorkerType) -> Arc<dyn LogStore> {
        Arc::new(MarkdownLogStore::new(
            self.root.join("agents").join(format!("{worker}.md")),
            Layout::Sections,
        ))
    }

    fn task_history(&self) -> Arc<dyn LogStore> {
        Arc::new(MarkdownLogStore::new(
            self.root.join(TASK_HISTORY_FILE),
            Layout::Lines {
                header_lines: TASK_HISTORY_HEADER_LINES,
            },
        ))
    }

    fn inter_agent_log(&self) -> Arc<dyn LogStore> {
        Arc::new(MarkdownLogStore::new(
            self.root.join(INTER_AGENT_FILE),
            Layout::Sections,
        ))
    }

    fn snapshot(&self) -> Arc<dyn LogStore> {
        Arc::new(MarkdownLogStore::new(self.snapshot_path(), Layout::Sections))
    }

    fn rules(&self) -> Arc<dyn RuleStore> {
        Arc::clone(&self.rules) as Arc<dyn RuleStore>
    }
}
