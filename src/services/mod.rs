//! Service layer: the coordination engine built on the domain ports.

pub mod audit_log;
pub mod event_bus;
pub mod memory_log;
pub mod notification_router;
pub mod orchestrator;
pub mod rule_engine;
pub mod scheduler;
pub mod snapshot;
pub mod task_queue_service;

pub use audit_log::{AuditCategory, AuditEntry, AuditLogConfig, AuditLogService};
pub use event_bus::{EventBus, PublishReport};
pub use memory_log::{AgentMemoryLog, MemoryLogSettings};
pub use notification_router::{route, NotificationRouter};
pub use orchestrator::{Orchestrator, OrchestratorBuilder, OrchestratorSettings};
pub use rule_engine::{
    DeferReason, FireOutcome, KeywordPredicate, RuleEngine, RuleEngineConfig, RuleFiring,
    RulePredicate, TaskOutcome,
};
pub use scheduler::{JobSpec, Scheduler};
pub use snapshot::{CounterSnapshot, JobSummary, SystemSnapshot, WorkerSummary};
pub use task_queue_service::TaskQueueService;
