//! Recurring job scheduler.
//!
//! One timing loop sleeps until the earliest `next_run` across all enabled
//! jobs, enqueues one task per due job and advances each fired job by
//! exactly one interval. Jobs fire in registration order.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    JobId, Priority, ScheduledJob, Task, TaskId, TaskOrigin, WorkerType,
};
use crate::services::task_queue_service::TaskQueueService;

/// Longest the loop sleeps when no job is enabled.
const IDLE_WAIT: Duration = Duration::from_secs(3600);

/// Parameters for a new recurring job.
#[derive(Debug, Clone)]
pub struct JobSpec {
    pub id: Option<JobId>,
    pub worker_type: WorkerType,
    pub interval: Duration,
    pub priority: Priority,
    pub input: Value,
}

impl JobSpec {
    pub fn new(worker_type: WorkerType, interval: Duration) -> Self {
        Self {
            id: None,
            worker_type,
            interval,
            priority: Priority::Normal,
            input: serde_json::json!({"mode": "scheduled"}),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_input(mut self, input: Value) -> Self {
        self.input = input;
        self
    }
}

pub struct Scheduler {
    jobs: RwLock<Vec<ScheduledJob>>,
    changed: Notify,
    queue: Arc<TaskQueueService>,
}

impl Scheduler {
    pub fn new(queue: Arc<TaskQueueService>) -> Self {
        Self {
            jobs: RwLock::new(Vec::new()),
            changed: Notify::new(),
            queue,
        }
    }

    pub async fn register(&self, spec: JobSpec) -> DomainResult<JobId> {
        self.register_at(spec, Utc::now()).await
    }

    /// Register a job whose first run is one interval after `now`.
    ///
    /// # Errors
    /// - `UnknownWorkerType` if no worker serves the job
    /// - `InvalidInterval` for a zero interval
    /// - `DuplicateJob` if the id is taken
    #[instrument(skip(self, spec), fields(worker = %spec.worker_type, interval = ?spec.interval), err)]
    pub async fn register_at(&self, spec: JobSpec, now: DateTime<Utc>) -> DomainResult<JobId> {
        if !self.queue.is_known(&spec.worker_type) {
            return Err(DomainError::UnknownWorkerType(spec.worker_type.to_string()));
        }
        let id = spec.id.unwrap_or_else(JobId::generate);
        let job = ScheduledJob::new(
            id.clone(),
            spec.worker_type,
            spec.interval,
            spec.priority,
            spec.input,
            now,
        )?;

        {
            let mut jobs = self.jobs.write().await;
            if jobs.iter().any(|j| j.id == id) {
                return Err(DomainError::DuplicateJob(id));
            }
            info!(job_id = %id, next_run = %job.next_run, "Job registered");
            jobs.push(job);
        }
        self.changed.notify_one();
        Ok(id)
    }

    /// Stop firing a job until it is resumed.
    pub async fn pause(&self, id: &JobId) -> DomainResult<()> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .iter_mut()
            .find(|j| &j.id == id)
            .ok_or_else(|| DomainError::JobNotFound(id.clone()))?;
        job.enabled = false;
        info!(job_id = %id, "Job paused");
        Ok(())
    }

    pub async fn resume(&self, id: &JobId) -> DomainResult<()> {
        self.resume_at(id, Utc::now()).await
    }

    /// Re-enable a job, moving `next_run` to the first grid point after `now`.
    pub async fn resume_at(&self, id: &JobId, now: DateTime<Utc>) -> DomainResult<()> {
        {
            let mut jobs = self.jobs.write().await;
            let job = jobs
                .iter_mut()
                .find(|j| &j.id == id)
                .ok_or_else(|| DomainError::JobNotFound(id.clone()))?;
            job.enabled = true;
            job.realign(now);
            info!(job_id = %id, next_run = %job.next_run, "Job resumed");
        }
        self.changed.notify_one();
        Ok(())
    }

    /// Jobs in registration order.
    pub async fn list(&self) -> Vec<ScheduledJob> {
        self.jobs.read().await.clone()
    }

    pub async fn get(&self, id: &JobId) -> Option<ScheduledJob> {
        self.jobs.read().await.iter().find(|j| &j.id == id).cloned()
    }

    /// Earliest `next_run` among enabled jobs.
    pub async fn next_due(&self) -> Option<DateTime<Utc>> {
        self.jobs
            .read()
            .await
            .iter()
            .filter(|j| j.enabled)
            .map(|j| j.next_run)
            .min()
    }

    /// Fire every job due at `now`, at most once each.
    ///
    /// A job that is several intervals behind fires once and stays due, so
    /// the loop catches up one interval per tick. Submission failures are
    /// logged and still advance the job.
    pub async fn tick(&self, now: DateTime<Utc>) -> Vec<TaskId> {
        let mut fired = Vec::new();
        let mut jobs = self.jobs.write().await;
        for job in jobs.iter_mut().filter(|j| j.is_due(now)) {
            let task = Task::new(job.worker_type.clone(), job.input.clone(), job.priority)
                .with_origin(TaskOrigin::Schedule {
                    job_id: job.id.clone(),
                });
            match self.queue.submit(task) {
                Ok(task_id) => {
                    debug!(job_id = %job.id, task_id = %task_id, "Scheduled task queued");
                    fired.push(task_id);
                }
                Err(e) => warn!(job_id = %job.id, error = %e, "Scheduled task rejected"),
            }
            job.advance(now);
        }
        fired
    }

    /// Spawn the timing loop. It exits when `shutdown` flips to true.
    pub fn start(self: &Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                let changed = scheduler.changed.notified();
                tokio::pin!(changed);
                changed.as_mut().enable();

                scheduler.tick(Utc::now()).await;
                let wait = match scheduler.next_due().await {
                    Some(at) => (at - Utc::now()).to_std().unwrap_or(Duration::ZERO),
                    None => IDLE_WAIT,
                };

                tokio::select! {
                    biased;
                    res = shutdown.changed() => {
                        if res.is_err() {
                            break;
                        }
                    }
                    () = &mut changed => {}
                    () = tokio::time::sleep(wait) => {}
                }
            }
            debug!("Scheduler loop stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::TaskStatus;
    use chrono::TimeDelta;

    fn setup() -> (Arc<Scheduler>, Arc<TaskQueueService>) {
        let queue = Arc::new(TaskQueueService::new(
            [WorkerType::new("trending"), WorkerType::new("rights")],
            100,
        ));
        (Arc::new(Scheduler::new(Arc::clone(&queue))), queue)
    }

    fn spec(worker: &str, secs: u64) -> JobSpec {
        JobSpec::new(WorkerType::new(worker), Duration::from_secs(secs))
    }

    #[tokio::test]
    async fn test_register_rejects_unknown_worker_and_duplicates() {
        let (scheduler, _) = setup();
        let t0 = Utc::now();
        assert!(matches!(
            scheduler.register_at(spec("weather", 10), t0).await,
            Err(DomainError::UnknownWorkerType(_))
        ));

        let id = JobId::new("trend_watch");
        scheduler
            .register_at(spec("trending", 10).with_id(id.clone()), t0)
            .await
            .unwrap();
        assert!(matches!(
            scheduler.register_at(spec("trending", 5).with_id(id), t0).await,
            Err(DomainError::DuplicateJob(_))
        ));
    }

    #[tokio::test]
    async fn test_tick_fires_due_jobs_in_registration_order() {
        let (scheduler, queue) = setup();
        let t0 = Utc::now();
        scheduler.register_at(spec("rights", 10), t0).await.unwrap();
        scheduler.register_at(spec("trending", 10), t0).await.unwrap();

        assert!(scheduler.tick(t0).await.is_empty());
        let fired = scheduler.tick(t0 + TimeDelta::seconds(10)).await;
        assert_eq!(fired.len(), 2);
        assert_eq!(queue.get(fired[0]).unwrap().worker_type.as_str(), "rights");
        assert_eq!(queue.get(fired[1]).unwrap().worker_type.as_str(), "trending");
        assert_eq!(queue.status(fired[0]), Some(TaskStatus::Pending));
    }

    #[tokio::test]
    async fn test_next_run_stays_on_grid() {
        let (scheduler, _) = setup();
        let t0 = Utc::now();
        let id = scheduler.register_at(spec("trending", 10), t0).await.unwrap();

        for k in 1..=6 {
            let late = t0 + TimeDelta::seconds(10 * k + 4);
            assert_eq!(scheduler.tick(late).await.len(), 1);
        }
        let job = scheduler.get(&id).await.unwrap();
        assert_eq!(job.run_count, 6);
        assert_eq!(job.next_run, t0 + TimeDelta::seconds(70));
    }

    #[tokio::test]
    async fn test_stalled_job_catches_up_one_interval_per_tick() {
        let (scheduler, queue) = setup();
        let t0 = Utc::now();
        let id = scheduler.register_at(spec("trending", 10), t0).await.unwrap();

        let stalled = t0 + TimeDelta::seconds(35);
        for _ in 0..3 {
            assert_eq!(scheduler.tick(stalled).await.len(), 1);
        }
        assert!(scheduler.tick(stalled).await.is_empty());
        assert_eq!(queue.depth(), 3);
        let job = scheduler.get(&id).await.unwrap();
        assert_eq!(job.next_run, t0 + TimeDelta::seconds(40));
    }

    #[tokio::test]
    async fn test_previous_run_unfinished_still_enqueues() {
        let (scheduler, queue) = setup();
        let t0 = Utc::now();
        scheduler.register_at(spec("trending", 10), t0).await.unwrap();
        scheduler.tick(t0 + TimeDelta::seconds(10)).await;
        scheduler.tick(t0 + TimeDelta::seconds(20)).await;
        assert_eq!(queue.depth(), 2);
    }

    #[tokio::test]
    async fn test_pause_and_resume_realigns() {
        let (scheduler, queue) = setup();
        let t0 = Utc::now();
        let id = scheduler.register_at(spec("trending", 10), t0).await.unwrap();

        scheduler.pause(&id).await.unwrap();
        assert!(scheduler.tick(t0 + TimeDelta::seconds(30)).await.is_empty());
        assert!(scheduler.next_due().await.is_none());

        scheduler
            .resume_at(&id, t0 + TimeDelta::seconds(35))
            .await
            .unwrap();
        let job = scheduler.get(&id).await.unwrap();
        assert_eq!(job.next_run, t0 + TimeDelta::seconds(40));
        assert_eq!(queue.depth(), 0);

        assert!(matches!(
            scheduler.pause(&JobId::new("missing")).await,
            Err(DomainError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_loop_fires_and_stops_on_shutdown() {
        let (scheduler, queue) = setup();
        let (tx, rx) = watch::channel(false);
        let handle = scheduler.start(rx);
        scheduler
            .register(spec("trending", 1).with_priority(Priority::High))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while queue.depth() == 0 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
        .await
        .unwrap();

        tx.send_replace(true);
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
