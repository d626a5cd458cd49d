use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;
use tracing::{debug, info, instrument};

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{Task, TaskId, TaskQueue, TaskStatus, WorkResult, WorkerType};

/// Shared state guarded by one lock so that queue order and task status
/// never disagree.
#[derive(Debug, Default)]
struct QueueState {
    pending: TaskQueue<TaskId>,
    tasks: HashMap<TaskId, Task>,
    /// Terminal tasks, oldest first, evicted past the history limit.
    finished: VecDeque<TaskId>,
}

impl QueueState {
    fn retire(&mut self, id: TaskId, history_limit: usize) {
        self.finished.push_back(id);
        while self.finished.len() > history_limit {
            if let Some(old) = self.finished.pop_front() {
                self.tasks.remove(&old);
            }
        }
    }
}

/// Service for managing task queue operations.
///
/// Holds pending tasks in strict priority order with FIFO tie-breaking and
/// keeps every task's status readable until it ages out of the completed
/// history. Submission never blocks; [`TaskQueueService::dequeue_next`]
/// waits until work is available.
///
/// # Examples
///
/// ```
/// use switchboard::domain::models::{Priority, Task, WorkerType};
/// use switchboard::services::TaskQueueService;
///
/// let queue = TaskQueueService::new([WorkerType::new("caption")], 100);
/// let task = Task::new(WorkerType::new("caption"), serde_json::json!({}), Priority::High);
/// let id = queue.submit(task).unwrap();
/// assert_eq!(queue.depth(), 1);
/// assert_eq!(queue.try_dequeue().map(|t| t.id), Some(id));
/// ```
#[derive(Debug)]
pub struct TaskQueueService {
    state: Mutex<QueueState>,
    available: Notify,
    known_workers: HashSet<WorkerType>,
    history_limit: usize,
}

impl TaskQueueService {
    /// Create a queue accepting tasks for `known_workers`
    pub fn new(known_workers: impl IntoIterator<Item = WorkerType>, history_limit: usize) -> Self {
        Self {
            state: Mutex::new(QueueState::default()),
            available: Notify::new(),
            known_workers: known_workers.into_iter().collect(),
            history_limit: history_limit.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_known(&self, worker: &WorkerType) -> bool {
        self.known_workers.contains(worker)
    }

    /// Registered worker types, sorted by name
    pub fn known_workers(&self) -> Vec<WorkerType> {
        let mut workers: Vec<WorkerType> = self.known_workers.iter().cloned().collect();
        workers.sort();
        workers
    }

    /// Submit a new task to the queue
    ///
    /// # Errors
    /// - `UnknownWorkerType` if no worker is registered for the task
    /// - `InvalidStateTransition` if the task is not PENDING
    #[instrument(skip(self, task), fields(task_id = %task.id, worker = %task.worker_type, priority = %task.priority), err)]
    pub fn submit(&self, task: Task) -> DomainResult<TaskId> {
        if !self.is_known(&task.worker_type) {
            return Err(DomainError::UnknownWorkerType(task.worker_type.to_string()));
        }
        if task.status != TaskStatus::Pending {
            return Err(DomainError::InvalidStateTransition {
                from: task.status,
                to: TaskStatus::Pending,
            });
        }

        let id = task.id;
        {
            let mut state = self.lock();
            state.pending.enqueue(id, task.priority);
            state.tasks.insert(id, task);
        }
        self.available.notify_one();
        debug!(origin = "queue", "Task enqueued");
        Ok(id)
    }

    /// Take the next eligible task without waiting
    ///
    /// The task is marked RUNNING before the lock is released, so no other
    /// caller can observe it as PENDING afterwards.
    pub fn try_dequeue(&self) -> Option<Task> {
        let mut state = self.lock();
        while let Some(id) = state.pending.dequeue() {
            let Some(task) = state.tasks.get_mut(&id) else {
                continue;
            };
            if task.mark_running().is_ok() {
                return Some(task.clone());
            }
        }
        None
    }

    /// Wait until a task is available and take it
    pub async fn dequeue_next(&self) -> Task {
        loop {
            let notified = self.available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(task) = self.try_dequeue() {
                return task;
            }
            notified.await;
        }
    }

    /// Record the terminal outcome of a RUNNING task
    ///
    /// Returns the updated task.
    pub fn complete(&self, id: TaskId, outcome: Result<WorkResult, String>) -> DomainResult<Task> {
        let mut state = self.lock();
        let task = state
            .tasks
            .get_mut(&id)
            .ok_or(DomainError::TaskNotFound(id))?;
        match outcome {
            Ok(result) => task.mark_succeeded(result)?,
            Err(error) => task.mark_failed(error)?,
        }
        let done = task.clone();
        state.retire(id, self.history_limit);
        Ok(done)
    }

    /// Cancel a task that has not started yet
    ///
    /// # Errors
    /// - `TaskNotFound` if the id is unknown or has aged out
    /// - `TaskNotPending` if the task already started or finished
    #[instrument(skip(self), err)]
    pub fn cancel(&self, id: TaskId) -> DomainResult<Task> {
        let mut state = self.lock();
        let task = state
            .tasks
            .get_mut(&id)
            .ok_or(DomainError::TaskNotFound(id))?;
        if task.status != TaskStatus::Pending {
            return Err(DomainError::TaskNotPending {
                id,
                status: task.status,
            });
        }
        task.mark_cancelled()?;
        let cancelled = task.clone();
        state.pending.remove_matching(|queued| *queued == id);
        state.retire(id, self.history_limit);
        info!(task_id = %id, "Task cancelled");
        Ok(cancelled)
    }

    pub fn status(&self, id: TaskId) -> Option<TaskStatus> {
        self.lock().tasks.get(&id).map(|t| t.status)
    }

    pub fn get(&self, id: TaskId) -> Option<Task> {
        self.lock().tasks.get(&id).cloned()
    }

    /// Number of PENDING tasks
    pub fn depth(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of RUNNING tasks
    pub fn running(&self) -> usize {
        self.lock()
            .tasks
            .values()
            .filter(|t| t.status == TaskStatus::Running)
            .count()
    }

    /// PENDING tasks in the order they will be dequeued
    pub fn pending_tasks(&self) -> Vec<Task> {
        let state = self.lock();
        state
            .pending
            .ordered()
            .into_iter()
            .filter_map(|entry| state.tasks.get(&entry.item).cloned())
            .collect()
    }
}
