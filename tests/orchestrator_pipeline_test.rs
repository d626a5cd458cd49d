//! End-to-end tests of the orchestrator pipeline over in-memory stores.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{fixture, ScriptedWorker};
use switchboard::domain::errors::DomainError;
use switchboard::domain::models::{
    defaults, EventType, Priority, RuleSchedule, SubscriptionTable, TaskOrigin, TaskStatus,
    WorkerType,
};
use switchboard::domain::ports::Worker;
use switchboard::infrastructure::workers::PassThroughWorker;
use switchboard::services::{JobSpec, OrchestratorBuilder, OrchestratorSettings};

fn worker(name: &str) -> WorkerType {
    WorkerType::new(name)
}

#[tokio::test]
async fn test_caption_cascade_through_default_tables() {
    let fx = fixture(
        PassThroughWorker::broadcast_set(),
        defaults::subscriptions(),
        OrchestratorSettings::default(),
    )
    .await;
    let orch = &fx.orchestrator;

    let id = orch
        .submit_task(&worker("caption"), json!({"data": {"segments": 12}}), Priority::High)
        .unwrap();
    // caption, then localization, social and live_fact_check
    assert_eq!(orch.drain().await, 4);

    assert_eq!(orch.get_task_status(id).unwrap(), TaskStatus::Succeeded);
    let counters = orch.counters();
    assert_eq!(counters.tasks_processed, 4);
    assert_eq!(counters.tasks_failed, 0);
    assert_eq!(counters.events_triggered, 1);

    let caption_log = fx.stores.agent_store(&worker("caption")).blocks();
    assert_eq!(caption_log.len(), 1);
    assert!(caption_log[0].contains("**Triggered**: CAPTION_COMPLETE"));

    let social = orch.agent_stats(&worker("social")).await.unwrap();
    assert_eq!(social.tasks, 1);
    assert_eq!(social.successes, 1);

    let comms = fx.stores.inter_agent_store().blocks();
    assert_eq!(comms.len(), 1);
    assert!(comms[0].contains("CAPTION_COMPLETE"));
    assert!(comms[0].contains("**Tasks queued**: 3"));

    assert_eq!(fx.stores.task_history_store().blocks().len(), 4);
}

#[tokio::test]
async fn test_fanned_out_tasks_carry_event_origin() {
    let fx = fixture(
        vec![
            ScriptedWorker::emitting("producer", &[EventType::ClipDetected]) as Arc<dyn Worker>,
            ScriptedWorker::new("consumer") as Arc<dyn Worker>,
        ],
        {
            let mut table = SubscriptionTable::new();
            table.subscribe(EventType::ClipDetected, worker("consumer"));
            table
        },
        OrchestratorSettings::default(),
    )
    .await;
    let orch = &fx.orchestrator;

    let source = orch
        .submit_task(&worker("producer"), json!({"raise": ["CLIP_DETECTED"]}), Priority::Low)
        .unwrap();
    let report = orch
        .publish(&switchboard::domain::models::Event::external(
            EventType::ClipDetected,
            json!({"clip": 1}),
        ))
        .await;
    assert_eq!(report.queued.len(), 1);
    let external_task = orch.get_task(report.queued[0].1).unwrap();
    assert_eq!(
        external_task.origin,
        TaskOrigin::Event {
            event_type: EventType::ClipDetected,
            source_task: None
        }
    );
    // NORMAL event task runs before the LOW producer.
    assert_eq!(external_task.priority, Priority::Normal);

    assert_eq!(orch.drain().await, 3);
    let consumer_log = fx.stores.agent_store(&worker("consumer")).blocks();
    assert_eq!(consumer_log.len(), 2);
    assert_eq!(orch.get_task_status(source).unwrap(), TaskStatus::Succeeded);
}

#[tokio::test]
async fn test_priority_order_of_execution() {
    let recorder = ScriptedWorker::new("recorder");
    let fx = fixture(
        vec![Arc::clone(&recorder) as Arc<dyn Worker>],
        SubscriptionTable::new(),
        OrchestratorSettings::default(),
    )
    .await;
    let orch = &fx.orchestrator;
    let w = worker("recorder");

    orch.submit_task(&w, json!({"name": "a"}), Priority::Normal).unwrap();
    orch.submit_task(&w, json!({"name": "b"}), Priority::Low).unwrap();
    orch.submit_task(&w, json!({"name": "c"}), Priority::Critical).unwrap();
    orch.submit_task(&w, json!({"name": "d"}), Priority::High).unwrap();

    assert_eq!(orch.drain().await, 4);
    assert_eq!(recorder.seen(), vec!["c", "d", "a", "b"]);
}

#[tokio::test]
async fn test_failed_task_is_not_retried() {
    let flaky = ScriptedWorker::new("flaky");
    let fx = fixture(
        vec![Arc::clone(&flaky) as Arc<dyn Worker>],
        SubscriptionTable::new(),
        OrchestratorSettings::default(),
    )
    .await;
    let orch = &fx.orchestrator;

    let id = orch
        .submit_task(&worker("flaky"), json!({"fail": "feed offline"}), Priority::High)
        .unwrap();
    assert_eq!(orch.drain().await, 1);
    assert_eq!(orch.drain().await, 0);

    assert_eq!(flaky.calls(), 1);
    let task = orch.get_task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error.as_deref(), Some("Worker failed: feed offline"));
    assert_eq!(orch.counters().tasks_failed, 1);

    let stats = orch.agent_stats(&worker("flaky")).await.unwrap();
    assert_eq!(stats.tasks, 1);
    assert_eq!(stats.successes, 0);
    let log = fx.stores.agent_store(&worker("flaky")).blocks();
    assert!(log[0].contains("FAILURE"));
}

#[tokio::test]
async fn test_timeout_fails_task() {
    let slow = ScriptedWorker::new("slow");
    let settings = OrchestratorSettings {
        task_timeout: Some(Duration::from_millis(20)),
        ..OrchestratorSettings::default()
    };
    let fx = fixture(vec![slow as Arc<dyn Worker>], SubscriptionTable::new(), settings).await;
    let orch = &fx.orchestrator;

    let id = orch
        .submit_task(&worker("slow"), json!({"sleep_ms": 2000}), Priority::Normal)
        .unwrap();
    orch.drain().await;

    let task = orch.get_task(id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.error.unwrap().starts_with("Task timed out"));
}

#[tokio::test]
async fn test_unknown_worker_rejected_synchronously() {
    let fx = fixture(
        vec![ScriptedWorker::new("known") as Arc<dyn Worker>],
        SubscriptionTable::new(),
        OrchestratorSettings::default(),
    )
    .await;
    let err = fx
        .orchestrator
        .submit_task(&worker("ghost"), json!({}), Priority::Normal)
        .unwrap_err();
    assert!(matches!(err, DomainError::UnknownWorkerType(_)));
    assert_eq!(fx.orchestrator.queue_depth(), 0);
}

#[tokio::test]
async fn test_cancel_only_pending() {
    let fx = fixture(
        vec![ScriptedWorker::new("w") as Arc<dyn Worker>],
        SubscriptionTable::new(),
        OrchestratorSettings::default(),
    )
    .await;
    let orch = &fx.orchestrator;

    let id = orch.submit_task(&worker("w"), json!({}), Priority::Normal).unwrap();
    orch.cancel_task(id).await.unwrap();
    assert_eq!(orch.get_task_status(id).unwrap(), TaskStatus::Cancelled);
    assert_eq!(orch.drain().await, 0);

    let err = orch.cancel_task(id).await.unwrap_err();
    assert!(matches!(err, DomainError::TaskNotPending { .. }));
    // The cancellation is on record.
    assert_eq!(fx.stores.task_history_store().blocks().len(), 1);
}

#[tokio::test]
async fn test_matching_rule_alerts_after_task() {
    let fx = fixture(
        PassThroughWorker::broadcast_set(),
        defaults::subscriptions(),
        OrchestratorSettings::default(),
    )
    .await;
    let orch = &fx.orchestrator;
    let compliance = worker("compliance");

    let rule = orch
        .add_rule(&compliance, "compliance_alert", RuleSchedule::Immediate, Priority::Critical)
        .await
        .unwrap();

    orch.submit_task(
        &compliance,
        json!({"data": {"issues": [{"severity": "critical", "rule": "watershed"}]}}),
        Priority::Normal,
    )
    .unwrap();
    orch.drain().await;

    let delivered = fx.sink.delivered();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].1.rule_id.as_ref(), Some(&rule.id));
    assert_eq!(delivered[0].1.priority, Priority::Critical);

    let rules = orch.list_rules(&compliance).await.unwrap();
    assert_eq!(rules[0].trigger_count, 1);
}

#[tokio::test]
async fn test_rule_api_validates_worker() {
    let fx = fixture(
        vec![ScriptedWorker::new("w") as Arc<dyn Worker>],
        SubscriptionTable::new(),
        OrchestratorSettings::default(),
    )
    .await;
    let err = fx
        .orchestrator
        .add_rule(&worker("ghost"), "anything here", RuleSchedule::Immediate, Priority::Low)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::UnknownWorkerType(_)));
}

#[tokio::test]
async fn test_memory_context_lists_newest_entries() {
    let fx = fixture(
        vec![ScriptedWorker::new("w") as Arc<dyn Worker>],
        SubscriptionTable::new(),
        OrchestratorSettings::default(),
    )
    .await;
    let orch = &fx.orchestrator;
    for i in 0..3 {
        orch.submit_task(&worker("w"), json!({"name": format!("item{i}")}), Priority::Normal)
            .unwrap();
    }
    orch.drain().await;

    let context = orch.get_memory_context(&worker("w"), 2).await.unwrap();
    assert!(context.starts_with("# w - Recent Memory"));
    assert!(!context.contains("item0"));
    assert!(context.contains("item1"));
    assert!(context.contains("item2"));
}

#[tokio::test]
async fn test_builder_rejects_reserved_and_duplicate_names() {
    let reserved = OrchestratorBuilder::new()
        .register_worker(ScriptedWorker::new("task_history") as Arc<dyn Worker>)
        .build()
        .await;
    assert!(matches!(reserved, Err(DomainError::ValidationFailed(_))));

    let duplicate = OrchestratorBuilder::new()
        .register_worker(ScriptedWorker::new("w") as Arc<dyn Worker>)
        .register_worker(ScriptedWorker::new("w") as Arc<dyn Worker>)
        .build()
        .await;
    assert!(matches!(duplicate, Err(DomainError::ValidationFailed(_))));
}

#[tokio::test]
async fn test_subscription_check_sees_worker_emits() {
    let fx = fixture(
        vec![
            ScriptedWorker::emitting("a", &[EventType::TrendingSpike]) as Arc<dyn Worker>,
            ScriptedWorker::emitting("b", &[EventType::BreakingNews]) as Arc<dyn Worker>,
        ],
        {
            let mut table = SubscriptionTable::new();
            table.subscribe(EventType::TrendingSpike, worker("b"));
            table.subscribe(EventType::BreakingNews, worker("a"));
            table
        },
        OrchestratorSettings::default(),
    )
    .await;
    assert!(matches!(
        fx.orchestrator.check_subscriptions(),
        Err(DomainError::SubscriptionCycle(_))
    ));
}

#[tokio::test]
async fn test_start_runs_tasks_and_shutdown_writes_snapshot() {
    let fx = fixture(
        vec![ScriptedWorker::new("w") as Arc<dyn Worker>],
        SubscriptionTable::new(),
        OrchestratorSettings {
            max_workers: 2,
            ..OrchestratorSettings::default()
        },
    )
    .await;
    let orch = &fx.orchestrator;
    orch.start().await;
    orch.start().await;
    assert!(orch.is_running());

    let id = orch.submit_task(&worker("w"), json!({}), Priority::Normal).unwrap();
    let finished = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if orch.get_task_status(id).unwrap().is_terminal() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(finished.is_ok());

    orch.shutdown().await;
    assert!(!orch.is_running());
    let snapshot = fx.stores.snapshot_store().header().unwrap();
    assert!(snapshot.starts_with("# System State"));
    assert!(snapshot.contains("- Processed: 1"));
}

#[tokio::test]
async fn test_jobs_fire_into_queue() {
    let fx = fixture(
        vec![ScriptedWorker::new("monitor") as Arc<dyn Worker>],
        SubscriptionTable::new(),
        OrchestratorSettings::default(),
    )
    .await;
    let orch = &fx.orchestrator;

    let id = orch
        .register_job_with(
            JobSpec::new(worker("monitor"), Duration::from_secs(60))
                .with_id(switchboard::domain::models::JobId::new("monitor_job")),
        )
        .await
        .unwrap();
    assert_eq!(id.as_str(), "monitor_job");

    orch.pause_job(&id).await.unwrap();
    let jobs = orch.list_jobs().await;
    assert_eq!(jobs.len(), 1);
    assert!(!jobs[0].enabled);

    orch.resume_job(&id).await.unwrap();
    assert!(orch.list_jobs().await[0].enabled);

    let err = orch
        .register_job(&worker("ghost"), Duration::from_secs(60), Priority::Low)
        .await
        .unwrap_err();
    assert!(matches!(err, DomainError::UnknownWorkerType(_)));
}
