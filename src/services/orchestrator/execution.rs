//! Task execution pipeline.
//!
//! Once the worker returns, the status update happens first and every
//! later step (memory, events, audit, rules) only logs its failures.

use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{debug, error, instrument, warn};

use super::Orchestrator;
use crate::domain::models::{Event, MemoryEntry, Task, WorkResult};
use crate::domain::ports::{Worker, WorkerError};
use crate::services::rule_engine::TaskOutcome;

impl Orchestrator {
    /// Run one dequeued (already RUNNING) task to completion.
    #[instrument(skip(self, task), fields(task_id = %task.id, worker = %task.worker_type))]
    pub(super) async fn run_task(&self, task: Task) {
        let Some(slot) = self.workers.get(&task.worker_type) else {
            let err = WorkerError::Unavailable(task.worker_type.to_string());
            error!(error = %err, "No worker registered for task");
            self.counters.tasks_failed.fetch_add(1, Ordering::Relaxed);
            if let Ok(done) = self.queue.complete(task.id, Err(err.to_string())) {
                self.audit.record_task(&done, 0).await;
            }
            return;
        };

        let started = Instant::now();
        let result = self.invoke(slot.worker.as_ref(), &task).await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let _completion = slot.completion.lock().await;

        let input_summary = slot.worker.summarize_input(&task.input);
        let (output_summary, events, payload) = match &result {
            Ok(work) => (
                slot.worker.summarize_output(work),
                slot.worker.triggered_events(work),
                Some(work.data().clone()),
            ),
            Err(e) => (format!("Error: {e}"), Vec::new(), None),
        };
        let error_text = result.as_ref().err().map(ToString::to_string);
        let success = result.is_ok();

        let done = match self
            .queue
            .complete(task.id, result.map_err(|e| e.to_string()))
        {
            Ok(done) => done,
            Err(e) => {
                error!(error = %e, "Failed to record task completion");
                return;
            }
        };

        if success {
            self.counters.tasks_processed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.counters.tasks_failed.fetch_add(1, Ordering::Relaxed);
        }

        let entry = MemoryEntry::new(
            task.id,
            input_summary.clone(),
            output_summary.clone(),
            duration_ms,
            success,
        );
        let appended = match slot.memory.append(entry).await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Failed to append memory entry");
                false
            }
        };

        if let Some(payload) = payload {
            for event_type in &events {
                let event = Event::from_task(
                    *event_type,
                    task.worker_type.clone(),
                    task.id,
                    payload.clone(),
                    output_summary.clone(),
                );
                let report = self.publish(&event).await;
                debug!(
                    event = %event_type,
                    queued = report.queued.len(),
                    rejected = report.rejected.len(),
                    "Triggered event published"
                );
            }
            if appended && !events.is_empty() {
                if let Err(e) = slot.memory.amend_last(task.id, events.clone()).await {
                    warn!(error = %e, "Failed to record triggered events");
                }
            }
        }

        self.audit.record_task(&done, duration_ms).await;

        let outcome = TaskOutcome {
            task_id: task.id,
            worker_type: task.worker_type.clone(),
            success,
            input_summary,
            output_summary,
            events,
            error: error_text,
        };
        let firings = self.rules.evaluate(&outcome).await;
        if !firings.is_empty() {
            debug!(count = firings.len(), "Rules fired");
        }
    }

    /// Call the worker, bounded by the task timeout when one is set.
    async fn invoke(
        &self,
        worker: &dyn Worker,
        task: &Task,
    ) -> Result<WorkResult, WorkerError> {
        match self.settings.task_timeout {
            Some(limit) => tokio::time::timeout(limit, worker.process(&task.input))
                .await
                .unwrap_or(Err(WorkerError::Timeout(limit))),
            None => worker.process(&task.input).await,
        }
    }

    /// Run pending tasks inline until the queue is empty.
    ///
    /// Tasks queued by events raised during the drain are run as well.
    /// Returns the number of tasks run.
    pub async fn drain(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.queue.try_dequeue() {
            self.run_task(task).await;
            ran += 1;
        }
        ran
    }
}
