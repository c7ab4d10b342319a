//! Queue workers
//!
//! A worker runs one job to completion before taking the next. Every job gets
//! its own execution context, populated only from its payload.

use super::queue::{InMemoryQueue, JobQueue};
use crate::batch::BatchTracker;
use crate::error::BatchResult;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Jobs handled by one worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub processed: u64,
    pub failed: u64,
}

impl WorkerStats {
    fn record(&mut self, result: &BatchResult<()>) {
        self.processed += 1;
        if result.is_err() {
            self.failed += 1;
        }
    }

    pub fn merge(self, other: WorkerStats) -> WorkerStats {
        WorkerStats {
            processed: self.processed + other.processed,
            failed: self.failed + other.failed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Worker {
    id: usize,
    tracker: BatchTracker,
    queue: Arc<InMemoryQueue>,
}

impl Worker {
    pub fn new(tracker: BatchTracker, queue: Arc<InMemoryQueue>) -> Self {
        Self::with_id(0, tracker, queue)
    }

    fn with_id(id: usize, tracker: BatchTracker, queue: Arc<InMemoryQueue>) -> Self {
        Self { id, tracker, queue }
    }

    /// Run the next queued job, if any
    pub async fn run_once(&self) -> Option<BatchResult<()>> {
        let next = self.queue.try_pop()?;
        Some(self.execute(next).await)
    }

    /// Run jobs until the queue is empty, including jobs enqueued along the way
    pub async fn run_until_idle(&self) -> WorkerStats {
        let mut stats = WorkerStats::default();
        while let Some(result) = self.run_once().await {
            stats.record(&result);
        }
        stats
    }

    /// Run jobs as they arrive until `shutdown` becomes `true`
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> WorkerStats {
        let mut stats = WorkerStats::default();
        debug!(worker = self.id, queue = %self.queue.name(), "Worker started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                next = self.queue.pop() => {
                    let result = self.execute(next).await;
                    stats.record(&result);
                }
            }
        }

        debug!(
            worker = self.id,
            processed = stats.processed,
            failed = stats.failed,
            "Worker stopped"
        );
        stats
    }

    async fn execute(&self, next: BatchResult<super::JobPayload>) -> BatchResult<()> {
        let result = match next {
            Ok(payload) => {
                let queue: Arc<dyn JobQueue> = self.queue.clone();
                self.tracker.perform(queue, payload).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            warn!(worker = self.id, error = %e, "Job failed");
        }
        result
    }

    /// Spawn `workers` concurrent workers on `queue`
    pub fn spawn_pool(
        tracker: &BatchTracker,
        queue: &Arc<InMemoryQueue>,
        workers: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<WorkerStats>> {
        info!(workers = workers, queue = %queue.name(), "Spawning worker pool");
        (0..workers)
            .map(|id| {
                let worker = Worker::with_id(id, tracker.clone(), queue.clone());
                let shutdown = shutdown.clone();
                tokio::spawn(async move { worker.run(shutdown).await })
            })
            .collect()
    }
}
