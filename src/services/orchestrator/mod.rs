//! Orchestrator - the central coordinator for switchboard.
//!
//! Owns the task queue, scheduler and event bus, runs a bounded pool of
//! executors and is the only component that calls a worker's `process`.
//! Around each task it records memory, publishes triggered events, writes
//! the audit logs and runs the rule engine.

mod builder;
mod execution;
mod loops;

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Config, Event, EventType, HopeRule, JobId, MemoryStats, Priority, RuleId, RuleSchedule, ScheduleConfig,
    ScheduledJob, SubscriptionTable, Task, TaskId, TaskStatus, WorkerType,
};
use crate::domain::ports::{LogStore, Worker};
use crate::services::audit_log::{AuditLogConfig, AuditLogService};
use crate::services::event_bus::{EventBus, PublishReport};
use crate::services::memory_log::{AgentMemoryLog, MemoryLogSettings};
use crate::services::rule_engine::{RuleEngine, RuleEngineConfig};
use crate::services::scheduler::{JobSpec, Scheduler};
use crate::services::snapshot::{
    self, CounterSnapshot, JobSummary, SystemSnapshot, WorkerSummary,
};
use crate::services::task_queue_service::TaskQueueService;

pub use builder::OrchestratorBuilder;

/// Worker names reserved for the cross-cutting logs.
pub const RESERVED_WORKER_NAMES: [&str; 2] = ["task_history", "inter_agent_comms"];

/// Resolved orchestrator settings.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Concurrent task executors.
    pub max_workers: usize,
    /// Priority of tasks fired by scheduled jobs.
    pub schedule_priority: Priority,
    pub snapshot_interval: Duration,
    /// Audit entries shown in each snapshot.
    pub snapshot_audit_entries: usize,
    /// Per-task time limit.
    pub task_timeout: Option<Duration>,
    /// Terminal tasks kept queryable by id.
    pub completed_task_history: usize,
    pub digest_check: Duration,
    pub memory: MemoryLogSettings,
    pub audit: AuditLogConfig,
    pub rules: RuleEngineConfig,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        let orch = &config.orchestrator;
        Self {
            max_workers: orch.max_workers.max(1),
            schedule_priority: orch.schedule_priority,
            snapshot_interval: Duration::from_secs(orch.snapshot_interval_secs.max(1)),
            snapshot_audit_entries: orch.snapshot_audit_entries,
            task_timeout: orch.task_timeout_secs.map(Duration::from_secs),
            completed_task_history: orch.completed_task_history,
            digest_check: Duration::from_secs(config.rules.digest_check_secs.max(1)),
            memory: MemoryLogSettings::from(&config.memory),
            audit: AuditLogConfig::from(&config.memory),
            rules: RuleEngineConfig::from(&config.rules),
        }
    }
}

/// Runtime counters.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    tasks_processed: AtomicU64,
    tasks_failed: AtomicU64,
    events_triggered: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            tasks_processed: self.tasks_processed.load(Ordering::Relaxed),
            tasks_failed: self.tasks_failed.load(Ordering::Relaxed),
            events_triggered: self.events_triggered.load(Ordering::Relaxed),
        }
    }
}

/// One registered worker and its memory log.
pub(crate) struct WorkerSlot {
    worker: Arc<dyn Worker>,
    memory: AgentMemoryLog,
    /// Held from status update to amend so entries of one worker never
    /// interleave between append and amend.
    completion: Mutex<()>,
}

pub struct Orchestrator {
    settings: OrchestratorSettings,
    queue: Arc<TaskQueueService>,
    scheduler: Arc<Scheduler>,
    bus: EventBus,
    workers: BTreeMap<WorkerType, WorkerSlot>,
    rules: RuleEngine,
    audit: AuditLogService,
    snapshot_store: Arc<dyn LogStore>,
    counters: Counters,
    started_at: DateTime<Utc>,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    fn require_worker(&self, worker: &WorkerType) -> DomainResult<&WorkerSlot> {
        self.workers
            .get(worker)
            .ok_or_else(|| DomainError::UnknownWorkerType(worker.to_string()))
    }

    /// Registered worker types, sorted by name.
    pub fn worker_types(&self) -> Vec<WorkerType> {
        self.workers.keys().cloned().collect()
    }

    // Tasks

    /// Queue a task. Never blocks.
    #[instrument(skip(self, input), fields(worker = %worker_type), err)]
    pub fn submit_task(
        &self,
        worker_type: &WorkerType,
        input: Value,
        priority: Priority,
    ) -> DomainResult<TaskId> {
        self.queue
            .submit(Task::new(worker_type.clone(), input, priority))
    }

    pub fn get_task_status(&self, id: TaskId) -> DomainResult<TaskStatus> {
        self.queue.status(id).ok_or(DomainError::TaskNotFound(id))
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.queue.get(id)
    }

    /// Cancel a task that has not started.
    pub async fn cancel_task(&self, id: TaskId) -> DomainResult<()> {
        let cancelled = self.queue.cancel(id)?;
        self.audit.record_task(&cancelled, 0).await;
        Ok(())
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.depth()
    }

    // Jobs

    pub async fn register_job(
        &self,
        worker_type: &WorkerType,
        interval: Duration,
        priority: Priority,
    ) -> DomainResult<JobId> {
        self.register_job_with(JobSpec::new(worker_type.clone(), interval).with_priority(priority))
            .await
    }

    pub async fn register_job_with(&self, spec: JobSpec) -> DomainResult<JobId> {
        self.scheduler.register(spec).await
    }

    pub async fn pause_job(&self, id: &JobId) -> DomainResult<()> {
        self.scheduler.pause(id).await
    }

    pub async fn resume_job(&self, id: &JobId) -> DomainResult<()> {
        self.scheduler.resume(id).await
    }

    pub async fn list_jobs(&self) -> Vec<ScheduledJob> {
        self.scheduler.list().await
    }

    /// Register jobs declared in configuration, stopping at the first error.
    pub async fn register_configured_schedules(
        &self,
        schedules: &[ScheduleConfig],
    ) -> DomainResult<Vec<JobId>> {
        let mut ids = Vec::with_capacity(schedules.len());
        for schedule in schedules {
            let mut spec = JobSpec::new(
                WorkerType::new(&schedule.worker_type),
                Duration::from_secs(schedule.interval_secs),
            )
            .with_priority(schedule.priority.unwrap_or(self.settings.schedule_priority));
            if !schedule.input.is_null() {
                spec = spec.with_input(schedule.input.clone());
            }
            if let Some(id) = &schedule.id {
                spec = spec.with_id(JobId::new(id.clone()));
            }
            ids.push(self.scheduler.register(spec).await?);
        }
        info!(count = ids.len(), "Configured schedules registered");
        Ok(ids)
    }

    // Events

    /// Publish an event: one task per subscriber, logged to the
    /// communications log.
    pub async fn publish(&self, event: &Event) -> PublishReport {
        let report = self.bus.publish(event);
        self.counters.events_triggered.fetch_add(1, Ordering::Relaxed);
        self.audit.record_event(event, &report).await;
        report
    }

    pub fn subscriptions(&self) -> &SubscriptionTable {
        self.bus.subscriptions()
    }

    /// Check the subscription graph against what the registered workers emit.
    pub fn check_subscriptions(&self) -> DomainResult<()> {
        let emits: HashMap<WorkerType, Vec<EventType>> = self
            .workers
            .iter()
            .map(|(name, slot)| (name.clone(), slot.worker.emits()))
            .collect();
        self.bus.check_acyclic(&emits)
    }

    // Rules

    pub async fn add_rule(
        &self,
        worker_type: &WorkerType,
        condition: &str,
        schedule: RuleSchedule,
        priority: Priority,
    ) -> DomainResult<HopeRule> {
        self.require_worker(worker_type)?;
        self.rules
            .add_rule(worker_type, condition, schedule, priority)
            .await
    }

    pub async fn cancel_rule(&self, worker_type: &WorkerType, id: &RuleId) -> DomainResult<HopeRule> {
        self.require_worker(worker_type)?;
        self.rules.cancel_rule(worker_type, id).await
    }

    pub async fn list_rules(&self, worker_type: &WorkerType) -> DomainResult<Vec<HopeRule>> {
        self.require_worker(worker_type)?;
        Ok(self.rules.list_rules(worker_type).await)
    }

    pub fn rule_engine(&self) -> &RuleEngine {
        &self.rules
    }

    // Memory and status

    /// The newest `n` memory entries of a worker, as text.
    pub async fn get_memory_context(&self, worker_type: &WorkerType, n: usize) -> DomainResult<String> {
        Ok(self.require_worker(worker_type)?.memory.recent_context(n).await)
    }

    /// Header counters of a worker's memory log.
    pub async fn agent_stats(&self, worker_type: &WorkerType) -> DomainResult<MemoryStats> {
        Ok(self.require_worker(worker_type)?.memory.stats().await)
    }

    pub fn counters(&self) -> CounterSnapshot {
        self.counters.snapshot()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Build a snapshot of live state.
    pub async fn snapshot(&self) -> SystemSnapshot {
        let jobs = self
            .scheduler
            .list()
            .await
            .into_iter()
            .map(|job| JobSummary {
                id: job.id,
                worker_type: job.worker_type,
                interval_secs: job.interval.as_secs(),
                priority: job.priority,
                next_run: job.next_run,
                run_count: job.run_count,
                enabled: job.enabled,
            })
            .collect();

        let mut workers = Vec::with_capacity(self.workers.len());
        for (name, slot) in &self.workers {
            let stats = slot.memory.stats().await;
            workers.push(WorkerSummary {
                worker_type: name.clone(),
                emits: slot.worker.emits(),
                memory_entries: stats.entries,
                tasks: stats.tasks,
                success_rate: stats.success_rate(),
            });
        }

        let recent_audit = self
            .audit
            .recent(self.settings.snapshot_audit_entries)
            .await
            .iter()
            .map(|entry| entry.to_line())
            .collect();

        SystemSnapshot {
            generated_at: Utc::now(),
            started_at: self.started_at,
            running: self.is_running(),
            queue_depth: self.queue.depth(),
            running_tasks: self.queue.running(),
            counters: self.counters.snapshot(),
            jobs,
            workers,
            recent_audit,
        }
    }

    /// Rewrite the snapshot document now. Returns false if the write failed.
    pub async fn write_snapshot(&self) -> bool {
        let snap = self.snapshot().await;
        snapshot::write_snapshot(self.snapshot_store.as_ref(), &snap).await
    }
}
