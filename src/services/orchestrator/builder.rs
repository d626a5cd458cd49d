//! Startup-time construction of an [`Orchestrator`].
//!
//! Workers and subscriptions can only be registered here; once built, the
//! registry and the subscription table are fixed.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use super::{Counters, Orchestrator, OrchestratorSettings, WorkerSlot, RESERVED_WORKER_NAMES};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Config, EventType, SubscriptionTable, UserProfile, WorkerType};
use crate::domain::ports::{AlertSink, StoreProvider, Worker};
use crate::infrastructure::notify::TracingAlertSink;
use crate::infrastructure::store::InMemoryStoreProvider;
use crate::services::audit_log::AuditLogService;
use crate::services::event_bus::EventBus;
use crate::services::memory_log::AgentMemoryLog;
use crate::services::notification_router::NotificationRouter;
use crate::services::rule_engine::{KeywordPredicate, RuleEngine, RulePredicate};
use crate::services::scheduler::Scheduler;
use crate::services::task_queue_service::TaskQueueService;

pub struct OrchestratorBuilder {
    settings: OrchestratorSettings,
    stores: Option<Arc<dyn StoreProvider>>,
    sink: Option<Arc<dyn AlertSink>>,
    predicate: Option<Arc<dyn RulePredicate>>,
    profile: UserProfile,
    workers: Vec<Arc<dyn Worker>>,
    subscriptions: SubscriptionTable,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            settings: OrchestratorSettings::default(),
            stores: None,
            sink: None,
            predicate: None,
            profile: UserProfile::default(),
            workers: Vec::new(),
            subscriptions: SubscriptionTable::new(),
        }
    }

    /// Settings and user profile taken from configuration.
    pub fn from_config(config: &Config) -> DomainResult<Self> {
        Ok(Self::new()
            .with_settings(OrchestratorSettings::from_config(config))
            .with_profile(UserProfile::from_config(&config.profile)?))
    }

    pub fn with_settings(mut self, settings: OrchestratorSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_stores(mut self, stores: Arc<dyn StoreProvider>) -> Self {
        self.stores = Some(stores);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn AlertSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn with_predicate(mut self, predicate: Arc<dyn RulePredicate>) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_profile(mut self, profile: UserProfile) -> Self {
        self.profile = profile;
        self
    }

    pub fn register_worker(mut self, worker: Arc<dyn Worker>) -> Self {
        self.workers.push(worker);
        self
    }

    pub fn subscribe(mut self, event_type: EventType, worker_type: WorkerType) -> Self {
        self.subscriptions.subscribe(event_type, worker_type);
        self
    }

    /// Replace the subscription table wholesale.
    pub fn with_subscriptions(mut self, table: SubscriptionTable) -> Self {
        self.subscriptions = table;
        self
    }

    /// Open the stores and assemble the orchestrator.
    ///
    /// Fails on a reserved or duplicate worker name. A subscription cycle
    /// is only reported.
    pub async fn build(self) -> DomainResult<Arc<Orchestrator>> {
        let stores = self
            .stores
            .unwrap_or_else(|| Arc::new(InMemoryStoreProvider::new()) as Arc<dyn StoreProvider>);
        let sink = self
            .sink
            .unwrap_or_else(|| Arc::new(TracingAlertSink) as Arc<dyn AlertSink>);
        let predicate = self
            .predicate
            .unwrap_or_else(|| Arc::new(KeywordPredicate) as Arc<dyn RulePredicate>);
        let settings = self.settings;

        let mut workers = BTreeMap::new();
        for worker in self.workers {
            let name = worker.worker_type();
            if RESERVED_WORKER_NAMES.contains(&name.as_str()) {
                return Err(DomainError::ValidationFailed(format!(
                    "worker name '{name}' is reserved"
                )));
            }
            if workers.contains_key(&name) {
                return Err(DomainError::ValidationFailed(format!(
                    "worker '{name}' registered twice"
                )));
            }
            let memory =
                AgentMemoryLog::open(name.clone(), stores.agent_log(&name), settings.memory).await;
            workers.insert(
                name,
                WorkerSlot {
                    worker,
                    memory,
                    completion: Mutex::new(()),
                },
            );
        }

        let queue = Arc::new(TaskQueueService::new(
            workers.keys().cloned(),
            settings.completed_task_history,
        ));
        let scheduler = Arc::new(Scheduler::new(Arc::clone(&queue)));
        let bus = EventBus::new(self.subscriptions, Arc::clone(&queue));
        let rules = RuleEngine::new(
            stores.rules(),
            predicate,
            NotificationRouter::new(sink, self.profile),
            settings.rules,
        );
        let audit =
            AuditLogService::open(settings.audit, stores.task_history(), stores.inter_agent_log())
                .await;
        let (shutdown_tx, _) = watch::channel(false);

        let orchestrator = Orchestrator {
            queue,
            scheduler,
            bus,
            workers,
            rules,
            audit,
            snapshot_store: stores.snapshot(),
            counters: Counters::default(),
            started_at: Utc::now(),
            running: AtomicBool::new(false),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
            settings,
        };

        if let Err(e) = orchestrator.check_subscriptions() {
            warn!(error = %e, "Subscription graph has a cycle");
        }
        info!(
            workers = orchestrator.workers.len(),
            executors = orchestrator.settings.max_workers,
            "Orchestrator built"
        );
        Ok(Arc::new(orchestrator))
    }
}
