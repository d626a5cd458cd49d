//! Common test utilities for integration tests
//!
//! Provides a scripted worker and an orchestrator fixture backed by
//! in-memory stores and a recording alert sink.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use switchboard::domain::models::{EventType, SubscriptionTable, WorkResult, WorkerType};
use switchboard::domain::ports::{AlertSink, StoreProvider, Worker, WorkerError};
use switchboard::infrastructure::notify::InMemoryAlertSink;
use switchboard::infrastructure::store::InMemoryStoreProvider;
use switchboard::services::{Orchestrator, OrchestratorBuilder, OrchestratorSettings};

/// Worker driven by its input:
/// - `"fail": "<msg>"` fails with that message
/// - `"sleep_ms": n` sleeps before answering
/// - `"raise": ["EVENT", ...]` names the events the result triggers
/// - `"name": "<x>"` is recorded in call order
///
/// The result data is the input itself.
pub struct ScriptedWorker {
    worker_type: WorkerType,
    emits: Vec<EventType>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl ScriptedWorker {
    pub fn new(name: &str) -> Arc<Self> {
        Self::emitting(name, &[])
    }

    pub fn emitting(name: &str, emits: &[EventType]) -> Arc<Self> {
        Arc::new(Self {
            worker_type: WorkerType::new(name),
            emits: emits.to_vec(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Worker for ScriptedWorker {
    fn worker_type(&self) -> WorkerType {
        self.worker_type.clone()
    }

    async fn process(&self, input: &Value) -> Result<WorkResult, WorkerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(name) = input.get("name").and_then(Value::as_str) {
            self.seen.lock().unwrap().push(name.to_string());
        }
        if let Some(ms) = input.get("sleep_ms").and_then(Value::as_u64) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        if let Some(msg) = input.get("fail").and_then(Value::as_str) {
            return Err(WorkerError::Failed(msg.to_string()));
        }
        Ok(WorkResult::new(input.clone()))
    }

    fn emits(&self) -> Vec<EventType> {
        self.emits.clone()
    }

    fn triggered_events(&self, result: &WorkResult) -> Vec<EventType> {
        result
            .data()
            .get("raise")
            .and_then(Value::as_array)
            .map(|names| {
                names
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|name| name.parse::<EventType>().ok())
                    .filter(|event| self.emits.contains(event))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct Fixture {
    pub orchestrator: Arc<Orchestrator>,
    pub stores: Arc<InMemoryStoreProvider>,
    pub sink: Arc<InMemoryAlertSink>,
}

pub async fn fixture(
    workers: Vec<Arc<dyn Worker>>,
    subscriptions: SubscriptionTable,
    settings: OrchestratorSettings,
) -> Fixture {
    let stores = Arc::new(InMemoryStoreProvider::new());
    let sink = Arc::new(InMemoryAlertSink::new());
    let mut builder = OrchestratorBuilder::new()
        .with_settings(settings)
        .with_stores(Arc::clone(&stores) as Arc<dyn StoreProvider>)
        .with_sink(Arc::clone(&sink) as Arc<dyn AlertSink>)
        .with_subscriptions(subscriptions);
    for worker in workers {
        builder = builder.register_worker(worker);
    }
    Fixture {
        orchestrator: builder.build().await.expect("orchestrator builds"),
        stores,
        sink,
    }
}
