//! # Jobs
//!
//! The job-system seam the tracker wraps. The host job system is reduced to
//! three pieces:
//!
//! - [`Job`]: a job class body, registered by name in the [`JobRegistry`]
//! - [`JobQueue`]: the enqueue side, receiving serialized [`JobPayload`]s
//! - [`Worker`]: the execute side, pulling payloads and running them through
//!   [`BatchTracker::perform`](crate::batch::BatchTracker::perform)
//!
//! Dispatch and execution are wrapped explicitly by
//! [`BatchTracker::dispatch`](crate::batch::BatchTracker::dispatch) and
//! [`BatchTracker::perform`](crate::batch::BatchTracker::perform); job bodies
//! never see the datastore marker.

pub mod payload;
pub mod queue;
pub mod worker;

pub use crate::registry::JobRegistry;
pub use payload::{
    embed_datastore, extract_datastore, splice_datastore, strip_datastore, JobPayload,
};
pub use queue::{InMemoryQueue, JobQueue};
pub use worker::{Worker, WorkerStats};

use crate::batch::BatchTracker;
use crate::context::Caller;
use crate::error::{BatchError, BatchResult};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::sync::Arc;

/// A background job class
#[async_trait]
pub trait Job: Send + Sync {
    /// Run the job body with its positional arguments
    async fn perform(&self, ctx: &JobContext, args: Vec<Value>) -> anyhow::Result<()>;
}

/// Identity of an enqueued job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub job_id: String,
    pub job_class: String,
    pub queue: String,
}

/// What a running job knows about itself
#[derive(Clone)]
pub struct JobContext {
    tracker: BatchTracker,
    job_id: String,
    job_class: String,
    queue: Option<Arc<dyn JobQueue>>,
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("job_id", &self.job_id)
            .field("job_class", &self.job_class)
            .field("queue", &self.queue.as_ref().map(|q| q.name().to_string()))
            .finish()
    }
}

impl JobContext {
    pub(crate) fn new(
        tracker: BatchTracker,
        payload: &JobPayload,
        queue: Option<Arc<dyn JobQueue>>,
    ) -> Self {
        Self {
            tracker,
            job_id: payload.jid.clone(),
            job_class: payload.class.clone(),
            queue,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn job_class(&self) -> &str {
        &self.job_class
    }

    pub fn tracker(&self) -> &BatchTracker {
        &self.tracker
    }

    /// Queue the job was pulled from; `None` when performed inline
    pub fn queue(&self) -> Option<&Arc<dyn JobQueue>> {
        self.queue.as_ref()
    }

    /// Dispatch onto the queue this job came from
    pub async fn dispatch(&self, class: &str, args: Vec<Value>) -> BatchResult<JobHandle> {
        let queue = self.queue.as_ref().ok_or_else(|| {
            BatchError::QueueError(format!(
                "{} was performed inline and has no queue, use dispatch_to",
                self.job_class
            ))
        })?;
        self.tracker.dispatch(queue.as_ref(), class, args).await
    }

    pub async fn dispatch_to(
        &self,
        queue: &dyn JobQueue,
        class: &str,
        args: Vec<Value>,
    ) -> BatchResult<JobHandle> {
        self.tracker.dispatch(queue, class, args).await
    }

    /// Start a batch whose caller is this job's `perform`
    pub async fn start_batch<F, T, E>(&self, seed: Map<String, Value>, block: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<BatchError>,
    {
        self.tracker
            .start_from(Caller::new(&self.job_class, "perform"), seed, block)
            .await
    }
}
