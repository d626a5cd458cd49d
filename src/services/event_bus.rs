//! Event bus: fans a published event out into subscriber tasks.
//!
//! The subscription table is fixed once the bus is built. Publishing is
//! synchronous and only enqueues, so a publish never waits on a worker.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, instrument, warn};

use crate::domain::errors::DomainResult;
use crate::domain::models::{
    Event, EventType, SubscriptionTable, Task, TaskId, TaskOrigin, WorkerType,
};
use crate::services::task_queue_service::TaskQueueService;

/// What a single publish did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PublishReport {
    pub event_type: Option<EventType>,
    /// Subscriber tasks that were enqueued, in subscription order.
    pub queued: Vec<(WorkerType, TaskId)>,
    /// Subscribers that could not be given a task, with the reason.
    pub rejected: Vec<(WorkerType, String)>,
}

impl PublishReport {
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.queued.iter().map(|(_, id)| *id).collect()
    }

    pub fn subscribers(&self) -> Vec<&WorkerType> {
        self.queued.iter().map(|(w, _)| w).collect()
    }
}

/// Event bus bound to one task queue.
pub struct EventBus {
    table: SubscriptionTable,
    queue: Arc<TaskQueueService>,
}

impl EventBus {
    pub fn new(table: SubscriptionTable, queue: Arc<TaskQueueService>) -> Self {
        Self { table, queue }
    }

    /// The full subscription table.
    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.table
    }

    pub fn subscribers(&self, event_type: EventType) -> &[WorkerType] {
        self.table.subscribers(event_type)
    }

    /// Enqueue one task per subscriber of `event.event_type`.
    ///
    /// Subscribers without a registered worker are skipped with a warning;
    /// they never fail the publish.
    #[instrument(skip(self, event), fields(event = %event.event_type, source = %event.source_label()))]
    pub fn publish(&self, event: &Event) -> PublishReport {
        let mut report = PublishReport {
            event_type: Some(event.event_type),
            ..PublishReport::default()
        };
        let priority = event.event_type.task_priority();
        let origin = TaskOrigin::Event {
            event_type: event.event_type,
            source_task: event.source_task,
        };

        for worker in self.table.subscribers(event.event_type) {
            let task = Task::new(worker.clone(), event.task_input(), priority)
                .with_origin(origin.clone());
            match self.queue.submit(task) {
                Ok(id) => {
                    debug!(worker = %worker, task_id = %id, "Subscriber task queued");
                    report.queued.push((worker.clone(), id));
                }
                Err(e) => {
                    warn!(worker = %worker, error = %e, "Skipping subscriber");
                    report.rejected.push((worker.clone(), e.to_string()));
                }
            }
        }
        report
    }

    /// Check that no event chain reachable from any event type loops back.
    pub fn check_acyclic(&self, emits: &HashMap<WorkerType, Vec<EventType>>) -> DomainResult<()> {
        self.table.check_acyclic(&EventType::ALL, emits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{defaults, Priority, TaskStatus};
    use serde_json::json;

    fn bus(workers: &[&str], table: SubscriptionTable) -> (EventBus, Arc<TaskQueueService>) {
        let queue = Arc::new(TaskQueueService::new(
            workers.iter().map(|w| WorkerType::new(w)),
            100,
        ));
        (EventBus::new(table, Arc::clone(&queue)), queue)
    }

    #[test]
    fn test_publish_fans_out_in_subscription_order() {
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::CaptionComplete, WorkerType::new("localization"));
        table.subscribe(EventType::CaptionComplete, WorkerType::new("social"));
        let (bus, queue) = bus(&["localization", "social"], table);

        let source = TaskId::new();
        let event = Event::from_task(
            EventType::CaptionComplete,
            WorkerType::new("caption"),
            source,
            json!({"segments": 4}),
            "segments=4".to_string(),
        );
        let report = bus.publish(&event);
        assert_eq!(report.queued.len(), 2);
        assert!(report.rejected.is_empty());
        assert_eq!(queue.depth(), 2);

        let first = queue.try_dequeue().unwrap();
        assert_eq!(first.worker_type.as_str(), "localization");
        assert_eq!(first.priority, Priority::Normal);
        assert_eq!(first.input["event_data"]["segments"], 4);
        assert_eq!(
            first.origin,
            TaskOrigin::Event {
                event_type: EventType::CaptionComplete,
                source_task: Some(source),
            }
        );
    }

    #[test]
    fn test_priority_comes_from_event_type() {
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::ComplianceAlert, WorkerType::new("social"));
        let (bus, queue) = bus(&["social"], table);
        let report = bus.publish(&Event::external(EventType::ComplianceAlert, json!({})));
        let task = queue.get(report.task_ids()[0]).unwrap();
        assert_eq!(task.priority, Priority::Critical);
        assert_eq!(task.status, TaskStatus::Pending);
    }

    #[test]
    fn test_unknown_subscriber_is_skipped() {
        let mut table = SubscriptionTable::new();
        table.subscribe(EventType::TrendingSpike, WorkerType::new("social"));
        table.subscribe(EventType::TrendingSpike, WorkerType::new("archive"));
        let (bus, queue) = bus(&["archive"], table);

        let report = bus.publish(&Event::external(EventType::TrendingSpike, json!({})));
        assert_eq!(report.queued.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0.as_str(), "social");
        assert_eq!(queue.depth(), 1);
    }

    #[test]
    fn test_event_without_subscribers_queues_nothing() {
        let (bus, queue) = bus(&["social"], SubscriptionTable::new());
        let report = bus.publish(&Event::external(EventType::BreakingNews, json!({})));
        assert!(report.queued.is_empty());
        assert_eq!(queue.depth(), 0);
    }

    #[test]
    fn test_default_tables_are_acyclic() {
        let (bus, _) = bus(&defaults::WORKER_TYPES, defaults::subscriptions());
        assert!(bus.check_acyclic(&defaults::triggers().emits_map()).is_ok());
    }
}
