//! Background loops: executors, scheduler, snapshot writer and digest check.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::Orchestrator;

impl Orchestrator {
    /// Start every background loop. A second call is a no-op.
    pub async fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Orchestrator already running");
            return;
        }
        self.shutdown_tx.send_replace(false);

        let mut handles = self.handles.lock().await;
        for index in 0..self.settings.max_workers {
            handles.push(self.spawn_executor(index, self.shutdown_tx.subscribe()));
        }
        handles.push(self.scheduler.start(self.shutdown_tx.subscribe()));
        handles.push(self.spawn_snapshot_loop(self.shutdown_tx.subscribe()));
        handles.push(self.spawn_digest_loop(self.shutdown_tx.subscribe()));

        info!(
            executors = self.settings.max_workers,
            workers = self.workers.len(),
            "Orchestrator started"
        );
    }

    /// Signal every loop to stop and wait for them. Tasks already running
    /// finish; pending tasks stay queued.
    pub async fn shutdown(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.shutdown_tx.send_replace(true);

        let handles: Vec<JoinHandle<()>> = self.handles.lock().await.drain(..).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "Background loop ended abnormally");
            }
        }
        if !self.write_snapshot().await {
            warn!("Final snapshot not written");
        }
        info!(pending = self.queue.depth(), "Orchestrator stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn spawn_executor(
        self: &Arc<Self>,
        index: usize,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                if *shutdown.borrow() {
                    break;
                }
                tokio::select! {
                    biased;
                    res = shutdown.changed() => {
                        if res.is_err() {
                            break;
                        }
                    }
                    task = orchestrator.queue.dequeue_next() => {
                        orchestrator.run_task(task).await;
                    }
                }
            }
            debug!(executor = index, "Executor stopped");
        })
    }

    fn spawn_snapshot_loop(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let period = self.settings.snapshot_interval;
        tokio::spawn(async move {
            every(period, shutdown, move || {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    orchestrator.write_snapshot().await;
                }
            })
            .await;
            debug!("Snapshot loop stopped");
        })
    }

    fn spawn_digest_loop(self: &Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let orchestrator = Arc::clone(self);
        let period = self.settings.digest_check;
        tokio::spawn(async move {
            every(period, shutdown, move || {
                let orchestrator = Arc::clone(&orchestrator);
                async move {
                    let sent = orchestrator.rules.run_due_digests(Utc::now()).await;
                    if !sent.is_empty() {
                        info!(count = sent.len(), "Daily digests sent");
                    }
                }
            })
            .await;
            debug!("Digest loop stopped");
        })
    }
}

/// Run `tick` every `period` until `shutdown` flips to true.
async fn every<F, Fut>(period: Duration, mut shutdown: watch::Receiver<bool>, mut tick: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        tokio::select! {
            biased;
            res = shutdown.changed() => {
                if res.is_err() || *shutdown.borrow() {
                    break;
                }
            }
            _ = interval.tick() => tick().await,
        }
    }
}
