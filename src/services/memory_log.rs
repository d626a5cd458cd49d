//! Per-worker bounded memory log.
//!
//! Each worker owns one log. Writes are serialized through the log's own
//! lock, so readers see the state before or after a write, never a partial
//! one. The header counters are kept in memory and rewritten after every
//! append; nothing scans the body to compute them.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::domain::errors::MemoryLogError;
use crate::domain::models::{EventType, MemoryConfig, MemoryEntry, MemoryStats, TaskId, WorkerType};
use crate::domain::ports::LogStore;

const ENTRY_SEPARATOR: &str = "\n\n---\n\n";

/// Bounds applied to one memory log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryLogSettings {
    /// Trim once the log holds more entries than this.
    pub max_entries: usize,
    /// Entries kept after a trim.
    pub trim_to: usize,
    /// Upper bound on `n` for [`AgentMemoryLog::recent_context`].
    pub context_cap: usize,
}

impl Default for MemoryLogSettings {
    fn default() -> Self {
        Self::from(&MemoryConfig::default())
    }
}

impl From<&MemoryConfig> for MemoryLogSettings {
    fn from(config: &MemoryConfig) -> Self {
        Self {
            max_entries: config.max_entries_per_agent,
            trim_to: config.trim_to.min(config.max_entries_per_agent),
            context_cap: config.recent_context_entries,
        }
    }
}

#[derive(Debug)]
struct LastEntry {
    entry: MemoryEntry,
    amended: bool,
}

#[derive(Debug, Default)]
struct LogState {
    stats: MemoryStats,
    /// Rendered blocks of the newest entries, at most `context_cap`.
    recent: VecDeque<String>,
    last: Option<LastEntry>,
}

pub struct AgentMemoryLog {
    worker: WorkerType,
    store: Arc<dyn LogStore>,
    settings: MemoryLogSettings,
    state: RwLock<LogState>,
}

impl AgentMemoryLog {
    /// Open the log for `worker`, recreating it when missing or unreadable.
    ///
    /// Never fails: storage problems are logged and the log starts empty.
    #[instrument(skip(worker, store, settings), fields(worker = %worker))]
    pub async fn open(
        worker: WorkerType,
        store: Arc<dyn LogStore>,
        settings: MemoryLogSettings,
    ) -> Self {
        let mut state = LogState::default();

        let parsed = match store.read_header().await {
            Ok(Some(header)) => {
                let stats = MemoryStats::parse_header(&header);
                if stats.is_none() {
                    warn!("Memory log header unreadable, recreating log");
                }
                stats
            }
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, "Memory log unreadable, recreating log");
                None
            }
        };

        match parsed {
            Some(mut stats) => {
                match store.len().await {
                    Ok(len) => stats.entries = len,
                    Err(e) => warn!(error = %e, "Could not count memory entries"),
                }
                state.stats = stats;
                match store.read_recent(settings.context_cap).await {
                    Ok(blocks) => state.recent = blocks.into(),
                    Err(e) => warn!(error = %e, "Could not warm memory context"),
                }
            }
            None => {
                if let Err(e) = store.reset(&state.stats.header(&worker)).await {
                    warn!(error = %e, "Failed to recreate memory log");
                }
            }
        }

        Self {
            worker,
            store,
            settings,
            state: RwLock::new(state),
        }
    }

    pub fn worker(&self) -> &WorkerType {
        &self.worker
    }

    /// Append one entry, trimming to the newest `trim_to` entries when the
    /// log grows past `max_entries`.
    ///
    /// Counters only move once the entry is stored.
    #[instrument(skip(self, entry), fields(worker = %self.worker, task_id = %entry.task_id), err)]
    pub async fn append(&self, entry: MemoryEntry) -> Result<(), MemoryLogError> {
        let block = entry.to_markdown();
        let mut state = self.state.write().await;

        if let Err(e) = self.store.append(&block).await {
            if !e.is_missing_or_corrupt() {
                return Err(e.into());
            }
            warn!(error = %e, "Memory log lost, recreating");
            self.recreate(&mut state).await?;
            self.store.append(&block).await?;
        }
        state.stats.record(&entry);
        state.recent.push_back(block);
        while state.recent.len() > self.settings.context_cap {
            state.recent.pop_front();
        }
        state.last = Some(LastEntry {
            entry,
            amended: false,
        });

        if state.stats.entries > self.settings.max_entries {
            match self.store.retain_recent(self.settings.trim_to).await {
                Ok(dropped) => {
                    debug!(dropped, "Memory log trimmed");
                    state.stats.entries = self.settings.trim_to;
                    while state.recent.len() > self.settings.trim_to {
                        state.recent.pop_front();
                    }
                }
                Err(e) => warn!(error = %e, "Memory log trim failed"),
            }
        }

        let header = state.stats.header(&self.worker);
        self.store.overwrite_header(&header).await?;
        Ok(())
    }

    /// Set the triggered events of the entry just appended for `task_id`.
    ///
    /// Allowed once per entry, and only for the most recent entry.
    #[instrument(skip(self, triggered), fields(worker = %self.worker), err)]
    pub async fn amend_last(
        &self,
        task_id: TaskId,
        triggered: Vec<EventType>,
    ) -> Result<(), MemoryLogError> {
        let mut state = self.state.write().await;
        let last = state.last.as_mut().ok_or(MemoryLogError::NothingToAmend)?;
        if last.entry.task_id != task_id {
            return Err(MemoryLogError::AmendMismatch {
                expected: task_id,
                found: last.entry.task_id,
            });
        }
        if last.amended {
            return Err(MemoryLogError::AlreadyAmended(task_id));
        }

        let mut entry = last.entry.clone();
        entry.triggered = triggered;
        let block = entry.to_markdown();
        match self.store.replace_last(&block).await {
            Ok(()) => {
                last.entry = entry;
                last.amended = true;
                if let Some(newest) = state.recent.back_mut() {
                    *newest = block;
                }
            }
            Err(e) if e.is_missing_or_corrupt() => {
                // Only the amended entry survives the lost document.
                warn!(error = %e, "Memory log lost, recreating with the amended entry");
                self.recreate(&mut state).await?;
                self.store.append(&block).await?;
                state.stats.record(&entry);
                state.recent.push_back(block);
                state.last = Some(LastEntry {
                    entry,
                    amended: true,
                });
                let header = state.stats.header(&self.worker);
                self.store.overwrite_header(&header).await?;
            }
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    /// Reset the document and the in-memory counters to an empty log.
    async fn recreate(&self, state: &mut LogState) -> Result<(), MemoryLogError> {
        *state = LogState::default();
        self.store.reset(&state.stats.header(&self.worker)).await?;
        Ok(())
    }

    /// The newest `n` entries as one compact text block, oldest first.
    ///
    /// `n` is clamped to the configured context cap. Returns an empty
    /// string when there is nothing to show.
    pub async fn recent_context(&self, n: usize) -> String {
        let n = n.min(self.settings.context_cap);
        let state = self.state.read().await;
        let skip = state.recent.len().saturating_sub(n);
        let blocks: Vec<&str> = state.recent.iter().skip(skip).map(String::as_str).collect();
        if blocks.is_empty() {
            return String::new();
        }
        format!(
            "# {} - Recent Memory\n\n{}",
            self.worker,
            blocks.join(ENTRY_SEPARATOR)
        )
    }

    pub async fn stats(&self) -> MemoryStats {
        self.state.read().await.stats
    }

    /// The entry written by the last append, as amended.
    pub async fn last_entry(&self) -> Option<MemoryEntry> {
        self.state
            .read()
            .await
            .last
            .as_ref()
            .map(|last| last.entry.clone())
    }
}
