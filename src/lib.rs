//! Switchboard - coordination core for a swarm of specialized workers
//!
//! Switchboard runs a priority task queue drained by a bounded executor pool,
//! fires recurring jobs on a drift-free grid, fans worker results out as
//! events to subscribed workers, keeps a bounded markdown memory log per
//! worker and delivers standing alert rules with quiet hours, a rolling rate
//! limit and a daily digest.
//!
//! # Architecture
//!
//! - **Domain Layer** (`domain`): models, errors and the ports adapters implement
//! - **Service Layer** (`services`): queue, scheduler, event bus, memory logs,
//!   rule engine and the orchestrator that ties them together
//! - **Infrastructure Layer** (`infrastructure`): config, logging, markdown
//!   stores, alert sinks and pass-through workers
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```no_run
//! use serde_json::json;
//! use switchboard::domain::models::{defaults, Priority, WorkerType};
//! use switchboard::infrastructure::workers::PassThroughWorker;
//! use switchboard::services::OrchestratorBuilder;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut builder = OrchestratorBuilder::new().with_subscriptions(defaults::subscriptions());
//!     for worker in PassThroughWorker::broadcast_set() {
//!         builder = builder.register_worker(worker);
//!     }
//!     let orchestrator = builder.build().await?;
//!
//!     orchestrator.submit_task(&WorkerType::new("caption"), json!({"text": "hi"}), Priority::High)?;
//!     orchestrator.start().await;
//!     orchestrator.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, Event, EventType, HopeRule, Priority, RuleSchedule, Task, TaskId, TaskStatus,
    WorkResult, WorkerType,
};
pub use domain::ports::{AlertSink, LogStore, RuleStore, StoreProvider, Worker, WorkerError};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Orchestrator, OrchestratorBuilder};
