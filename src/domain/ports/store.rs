//! Storage ports for memory logs, audit logs, snapshots and rules.

use std::sync::Arc;

use async_trait::async_trait;

use super::errors::StoreError;
use crate::domain::models::{HopeRule, WorkerType};

/// An append-only document made of a header and ordered entry blocks.
///
/// The core treats blocks as opaque text; only the header is ever parsed
/// back. Implementations must apply each call atomically with respect to
/// other calls on the same store.
#[async_trait]
pub trait LogStore: Send + Sync {
    /// Header text, or `None` if the document does not exist yet.
    async fn read_header(&self) -> Result<Option<String>, StoreError>;

    /// Replace the header, keeping every block.
    async fn overwrite_header(&self, header: &str) -> Result<(), StoreError>;

    /// Append one block after the last one.
    async fn append(&self, block: &str) -> Result<(), StoreError>;

    /// The last `n` blocks, oldest first.
    async fn read_recent(&self, n: usize) -> Result<Vec<String>, StoreError>;

    /// Replace the last block. Fails with `NotFound` when there is none.
    async fn replace_last(&self, block: &str) -> Result<(), StoreError>;

    /// Drop all but the last `keep` blocks. Returns how many were dropped.
    async fn retain_recent(&self, keep: usize) -> Result<usize, StoreError>;

    /// Number of blocks.
    async fn len(&self) -> Result<usize, StoreError>;

    /// Recreate the document with only `header`.
    async fn reset(&self, header: &str) -> Result<(), StoreError>;
}

/// Persistence for standing rules, one table per worker type.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Rules for `worker`; empty when none were ever saved.
    async fn load(&self, worker: &WorkerType) -> Result<Vec<HopeRule>, StoreError>;

    /// Replace the stored rules for `worker`.
    async fn save(&self, worker: &WorkerType, rules: &[HopeRule]) -> Result<(), StoreError>;

    /// Worker types that have a stored rule table.
    async fn workers(&self) -> Result<Vec<WorkerType>, StoreError>;
}

/// Factory for every store the orchestrator needs.
pub trait StoreProvider: Send + Sync {
    fn agent_log(&self, worker: &WorkerType) -> Arc<dyn LogStore>;
    fn task_history(&self) -> Arc<dyn LogStore>;
    fn inter_agent_log(&self) -> Arc<dyn LogStore>;
    fn snapshot(&self) -> Arc<dyn LogStore>;
    fn rules(&self) -> Arc<dyn RuleStore>;
}
