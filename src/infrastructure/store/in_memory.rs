//! In-memory stores for tests and memory-less embedding.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;

use crate::domain::models::{HopeRule, WorkerType};
use crate::domain::ports::{LogStore, RuleStore, StoreError, StoreProvider};

#[derive(Debug, Default)]
struct Document {
    exists: bool,
    header: String,
    blocks: Vec<String>,
}

/// A [`LogStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryLogStore {
    doc: Mutex<Document>,
}

impl InMemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with raw header text, as if read from disk.
    pub fn with_header(header: &str) -> Self {
        Self {
            doc: Mutex::new(Document {
                exists: true,
                header: header.to_string(),
                blocks: Vec::new(),
            }),
        }
    }

    /// Every block, oldest first.
    pub fn blocks(&self) -> Vec<String> {
        self.lock().blocks.clone()
    }

    pub fn header(&self) -> Option<String> {
        let doc = self.lock();
        doc.exists.then(|| doc.header.clone())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Document> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LogStore for InMemoryLogStore {
    async fn read_header(&self) -> Result<Option<String>, StoreError> {
        Ok(self.header())
    }

    async fn overwrite_header(&self, header: &str) -> Result<(), StoreError> {
        let mut doc = self.lock();
        doc.exists = true;
        doc.header = header.to_string();
        Ok(())
    }

    async fn append(&self, block: &str) -> Result<(), StoreError> {
        let mut doc = self.lock();
        if !doc.exists {
            return Err(StoreError::NotFound("in-memory log".to_string()));
        }
        doc.blocks.push(block.to_string());
        Ok(())
    }

    async fn read_recent(&self, n: usize) -> Result<Vec<String>, StoreError> {
        let doc = self.lock();
        let skip = doc.blocks.len().saturating_sub(n);
        Ok(doc.blocks[skip..].to_vec())
    }

    async fn replace_last(&self, block: &str) -> Result<(), StoreError> {
        let mut doc = self.lock();
        let last = doc
            .blocks
            .last_mut()
            .ok_or_else(|| StoreError::NotFound("in-memory log: no entry".to_string()))?;
        *last = block.to_string();
        Ok(())
    }

    async fn retain_recent(&self, keep: usize) -> Result<usize, StoreError> {
        let mut doc = self.lock();
        let dropped = doc.blocks.len().saturating_sub(keep);
        doc.blocks.drain(..dropped);
        Ok(dropped)
    }

    async fn len(&self) -> Result<usize, StoreError> {
        Ok(self.lock().blocks.len())
    }

    async fn reset(&self, header: &str) -> Result<(), StoreError> {
        let mut doc = self.lock();
        *doc = Document {
            exists: true,
            header: header.to_string(),
            blocks: Vec::new(),
        };
        Ok(())
    }
}

/// A [`RuleStore`] kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryRuleStore {
    rules: Mutex<HashMap<WorkerType, Vec<HopeRule>>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn load(&self, worker: &WorkerType) -> Result<Vec<HopeRule>, StoreError> {
        let rules = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(rules.get(worker).cloned().unwrap_or_default())
    }

    async fn save(&self, worker: &WorkerType, rules: &[HopeRule]) -> Result<(), StoreError> {
        let mut stored = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        stored.insert(worker.clone(), rules.to_vec());
        Ok(())
    }

    async fn workers(&self) -> Result<Vec<WorkerType>, StoreError> {
        let stored = self.rules.lock().unwrap_or_else(PoisonError::into_inner);
        let mut workers: Vec<WorkerType> = stored.keys().cloned().collect();
        workers.sort();
        Ok(workers)
    }
}

/// Hands out in-memory stores and keeps them reachable for inspection.
#[derive(Default)]
pub struct InMemoryStoreProvider {
    agent_logs: Mutex<HashMap<WorkerType, Arc<InMemoryLogStore>>>,
    task_history: Arc<InMemoryLogStore>,
    inter_agent: Arc<InMemoryLogStore>,
    snapshot: Arc<InMemoryLogStore>,
    rules: Arc<InMemoryRuleStore>,
}

impl InMemoryStoreProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// The concrete store behind `agent_log(worker)`.
    pub fn agent_store(&self, worker: &WorkerType) -> Arc<InMemoryLogStore> {
        let mut logs = self.agent_logs.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(logs.entry(worker.clone()).or_default())
    }

    pub fn task_history_store(&self) -> Arc<InMemoryLogStore> {
        Arc::clone(&self.task_history)
    }

    pub fn inter_agent_store(&self) -> Arc<InMemoryLogStore> {
        Arc::clone(&self.inter_agent)
    }

    pub fn snapshot_store(&self) -> Arc<InMemoryLogStore> {
        Arc::clone(&self.snapshot)
    }
}

impl StoreProvider for InMemoryStoreProvider {
    fn agent_log(&self, worker: &WorkerType) -> Arc<dyn LogStore> {
        self.agent_store(worker)
    }

    fn task_history(&self) -> Arc<dyn LogStore> {
        self.task_history_store()
    }

    fn inter_agent_log(&self) -> Arc<dyn LogStore> {
        self.inter_agent_store()
    }

    fn snapshot(&self) -> Arc<dyn LogStore> {
        self.snapshot_store()
    }

    fn rules(&self) -> Arc<dyn RuleStore> {
        Arc::clone(&self.rules) as Arc<dyn RuleStore>
    }
}
