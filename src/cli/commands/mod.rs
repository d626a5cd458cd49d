//! CLI command implementations.

pub mod memory;
pub mod rules;
pub mod run;
pub mod status;
pub mod subscriptions;

use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};

use crate::domain::models::{defaults, Config, WorkerType};
use crate::domain::ports::StoreProvider;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::store::{InMemoryStoreProvider, MarkdownStoreProvider};

/// Load configuration from `path`, or from `.switchboard/` plus the
/// environment.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Markdown stores under the memory directory, or in-memory stores when
/// memory is disabled.
pub fn store_provider(config: &Config) -> Arc<dyn StoreProvider> {
    if config.memory.enabled {
        Arc::new(MarkdownStoreProvider::new(&config.memory.dir))
    } else {
        Arc::new(InMemoryStoreProvider::new())
    }
}

/// Resolve a worker name against the default worker set.
pub fn known_worker(name: &str) -> Result<WorkerType> {
    let worker = WorkerType::new(name);
    if !defaults::WORKER_TYPES.contains(&worker.as_str()) {
        bail!(
            "unknown worker type '{name}' (known: {})",
            defaults::WORKER_TYPES.join(", ")
        );
    }
    Ok(worker)
}
