//! Batch tracker
//!
//! Owns the counter store, callback dispatch and job registry, and wraps the
//! three points where batch bookkeeping happens:
//!
//! - [`BatchTracker::start`]: the session registers `batch_<id>` and removes it
//!   when its block exits
//! - [`BatchTracker::dispatch`]: each tracked job registers `job_<jid>` before
//!   it is enqueued, with the datastore embedded in its arguments
//! - [`BatchTracker::perform`]: the job installs the embedded datastore, runs,
//!   and removes `job_<jid>` when the outermost unit of work exits
//!
//! Whichever removal observes an empty member set fires `complete`.

use super::id::generate_batch_id;
use crate::callbacks::{BatchCallback, CallbackDispatcher, CallbackInvocation, CallbackRegistry};
use crate::config::{BatchConfig, ConfigManager};
use crate::constants::members;
use crate::context::{self, BatchInfo, Caller, Datastore};
use crate::error::{BatchError, BatchResult};
use crate::jobs::{
    embed_datastore, extract_datastore, InMemoryQueue, Job, JobContext, JobHandle, JobPayload,
    JobQueue, JobRegistry,
};
use crate::store::{CounterStore, MemberRemoval};
use crate::transaction::{ContextTransactions, TransactionCallback, TransactionManager};
use crate::{log_batch, log_member};
use futures::FutureExt;
use serde_json::{Map, Value};
use std::future::Future;
use std::panic::{resume_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

struct TrackerInner {
    store: CounterStore,
    config: BatchConfig,
    dispatcher: CallbackDispatcher,
    jobs: JobRegistry,
    transactions: Arc<dyn TransactionManager>,
}

/// Shared handle to the tracker; clones are cheap
#[derive(Clone)]
pub struct BatchTracker {
    inner: Arc<TrackerInner>,
}

impl std::fmt::Debug for BatchTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchTracker")
            .field("store", &self.inner.store.provider_name())
            .field("ignore_list", &self.inner.config.ignore_list)
            .field("callbacks", &self.inner.dispatcher.registry().names())
            .field("jobs", &self.inner.jobs.classes())
            .finish()
    }
}

#[derive(Default)]
pub struct BatchTrackerBuilder {
    store: Option<CounterStore>,
    config: BatchConfig,
    callbacks: CallbackRegistry,
    jobs: JobRegistry,
    transactions: Option<Arc<dyn TransactionManager>>,
}

impl BatchTrackerBuilder {
    pub fn store(mut self, store: CounterStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(mut self, config: BatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Exempt a job class from tracking
    pub fn ignore(mut self, job_class: impl Into<String>) -> Self {
        self.config.ignore_list.push(job_class.into());
        self
    }

    pub fn callbacks(mut self, registry: CallbackRegistry) -> Self {
        self.callbacks = registry;
        self
    }

    pub fn jobs(mut self, registry: JobRegistry) -> Self {
        self.jobs = registry;
        self
    }

    pub fn transactions(mut self, manager: Arc<dyn TransactionManager>) -> Self {
        self.transactions = Some(manager);
        self
    }

    /// Build the tracker; without an explicit store an in-memory one is used
    pub fn build(self) -> BatchTracker {
        let transactions = self
            .transactions
            .unwrap_or_else(|| Arc::new(ContextTransactions));
        let store = self.store.unwrap_or_else(|| {
            CounterStore::in_memory()
                .with_namespace(self.config.store.namespace.clone())
                .with_member_ttl(self.config.store.member_ttl())
        });

        BatchTracker {
            inner: Arc::new(TrackerInner {
                store,
                config: self.config,
                dispatcher: CallbackDispatcher::new(self.callbacks, transactions.clone()),
                jobs: self.jobs,
                transactions,
            }),
        }
    }
}

impl BatchTracker {
    pub fn builder() -> BatchTrackerBuilder {
        BatchTrackerBuilder::default()
    }

    /// Tracker for a loaded configuration
    ///
    /// The counter store degrades to an unavailable backend when Redis cannot
    /// be reached, so this never fails.
    pub async fn from_config(manager: &ConfigManager) -> Self {
        let config = manager.config().clone();
        let store = CounterStore::from_config_graceful(&config.store, manager.environment()).await;
        Self::builder().config(config).store(store).build()
    }

    pub fn store(&self) -> &CounterStore {
        &self.inner.store
    }

    pub fn config(&self) -> &BatchConfig {
        &self.inner.config
    }

    pub fn callbacks(&self) -> &CallbackRegistry {
        self.inner.dispatcher.registry()
    }

    pub fn jobs(&self) -> &JobRegistry {
        &self.inner.jobs
    }

    /// In-process queue producing payloads in the configured wire layout
    pub fn in_memory_queue(&self, name: impl Into<String>) -> Arc<InMemoryQueue> {
        Arc::new(InMemoryQueue::new(name, self.inner.config.job_platform))
    }

    pub fn register_callback<C>(&self, name: impl Into<String>)
    where
        C: BatchCallback + Default + 'static,
    {
        self.callbacks().register::<C>(name);
    }

    pub fn register_job<J>(&self, class: impl Into<String>)
    where
        J: Job + Default + 'static,
    {
        self.inner.jobs.register::<J>(class);
    }

    /// Whether a job class skips membership tracking and datastore propagation
    ///
    /// True for classes on the ignore-list, and for the class that originated
    /// the active batch.
    pub fn is_ignored(&self, job_class: &str) -> bool {
        if job_class.is_empty() {
            return false;
        }
        self.inner.config.is_ignored(job_class)
            || super::info().is_some_and(|info| info.caller.type_name == job_class)
    }

    /// Run `block` inside a batch seeded with `seed`
    ///
    /// If a batch is already active the block joins it and `seed` is
    /// ignored. Otherwise a new batch is opened, and when the block exits the
    /// session's own membership is removed; if that empties the batch,
    /// `complete` fires before this returns (or at transaction commit).
    ///
    /// An error from the block is returned after cleanup and takes priority
    /// over callback errors.
    pub async fn start<F, T, E>(&self, seed: Map<String, Value>, block: F) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<BatchError>,
    {
        self.start_from(Caller::anonymous(), seed, block).await
    }

    /// [`start`](Self::start) with an explicit originating caller
    pub async fn start_from<F, T, E>(
        &self,
        caller: Caller,
        seed: Map<String, Value>,
        block: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<BatchError>,
    {
        context::ensure_scope(self.run_session(caller, seed, block)).await
    }

    async fn run_session<F, T, E>(
        &self,
        caller: Caller,
        seed: Map<String, Value>,
        block: F,
    ) -> Result<T, E>
    where
        F: Future<Output = Result<T, E>>,
        E: From<BatchError>,
    {
        if super::is_active() {
            debug!("Batch already active, joining it");
            return block.await;
        }

        let batch_id = generate_batch_id();
        let info = BatchInfo::new(batch_id.clone(), caller);
        let mut datastore = Datastore::from(seed);
        datastore
            .set_batch_info(&info)
            .map_err(|e| E::from(BatchError::from(e)))?;

        context::set(datastore.clone());
        context::enter();

        let token = members::batch_token(&batch_id);
        if let Err(e) = self.inner.store.add_member(&batch_id, &token).await {
            context::exit();
            context::clear();
            warn!(batch_id = %batch_id, error = %e, "Failed to register batch session");
            return Err(E::from(BatchError::from(e)));
        }
        let mut guard = SessionGuard {
            tracker: Some(self.clone()),
            batch_id: batch_id.clone(),
            token: token.clone(),
            datastore: datastore.clone(),
        };
        log_member!(debug, "ADD", batch_id: batch_id, token: token,);
        log_batch!(
            info,
            "START",
            batch_id: batch_id,
            caller_type: info.caller.type_name,
            caller_method: info.caller.method,
        );

        let outcome = AssertUnwindSafe(block).catch_unwind().await;
        guard.disarm();

        let snapshot = session_snapshot(datastore);
        context::exit();
        self.clear_datastore(Some(&batch_id));

        let cleanup = match self.release_member(&batch_id, &token).await {
            Some(removal) if removal.completes_batch() => {
                self.complete_batch(&batch_id, snapshot).await
            }
            _ => Ok(()),
        };

        match outcome {
            Err(panic) => resume_unwind(panic),
            Ok(Err(e)) => Err(e),
            Ok(Ok(value)) => cleanup.map(|()| value).map_err(E::from),
        }
    }

    /// Enqueue `class` on `queue`, tracking it when a batch is active
    ///
    /// The member is registered before the payload is pushed. If the push
    /// fails the member is removed again.
    pub async fn dispatch(
        &self,
        queue: &dyn JobQueue,
        class: &str,
        args: Vec<Value>,
    ) -> BatchResult<JobHandle> {
        let mut payload = JobPayload::new(class, queue.name(), args);

        let tracked = if self.is_ignored(class) {
            debug!(job_class = %class, "Job class ignored, dispatching untracked");
            None
        } else {
            super::datastore().and_then(|ds| ds.batch_info().map(|info| (info.id, ds)))
        };

        let token = members::job_token(&payload.jid);
        if let Some((batch_id, datastore)) = &tracked {
            self.inner.store.add_member(batch_id, &token).await?;
            log_member!(debug, "ADD", batch_id: batch_id, token: token, job_class: class);
            embed_datastore(&mut payload.args, datastore);
        }

        if let Err(e) = queue.push(payload.to_wire(queue.platform())).await {
            if let Some((batch_id, _)) = &tracked {
                self.release_member(batch_id, &token).await;
            }
            return Err(e);
        }

        Ok(JobHandle {
            job_id: payload.jid,
            job_class: payload.class,
            queue: payload.queue,
        })
    }

    /// Execute a payload pulled from `queue`
    ///
    /// The job runs on a fresh execution context, as it would on a worker in
    /// another process. Only open transactions carry over from the caller.
    pub async fn perform(&self, queue: Arc<dyn JobQueue>, payload: JobPayload) -> BatchResult<()> {
        context::isolated(self.run_member(Some(queue), payload)).await
    }

    /// Execute `class` inline on the current context
    ///
    /// Nothing is enqueued, so no member is added; a datastore marker in
    /// `args` is honoured exactly as for queued jobs.
    pub async fn perform_now(&self, class: &str, args: Vec<Value>) -> BatchResult<()> {
        let payload = JobPayload::new(class, "inline", args);
        context::ensure_scope(self.run_member(None, payload)).await
    }

    async fn run_member(
        &self,
        queue: Option<Arc<dyn JobQueue>>,
        mut payload: JobPayload,
    ) -> BatchResult<()> {
        let job = self
            .inner
            .jobs
            .resolve(&payload.class)
            .ok_or_else(|| BatchError::UnknownJob(payload.class.clone()))?;
        let mut args = std::mem::take(&mut payload.args);
        let ctx = JobContext::new(self.clone(), &payload, queue);
        let job_failed = |e: anyhow::Error| BatchError::JobFailed {
            job_class: payload.class.clone(),
            job_id: payload.jid.clone(),
            reason: format!("{e:#}"),
        };

        if self.is_ignored(&payload.class) {
            return job.perform(&ctx, args).await.map_err(job_failed);
        }

        let depth = context::enter();
        let embedded = extract_datastore(&mut args);
        if depth == 1 {
            // the outermost unit of work owns the slot, whatever was left in it
            match embedded {
                Some(datastore) => {
                    context::set(datastore);
                }
                None => context::clear(),
            }
        }

        let outcome = AssertUnwindSafe(job.perform(&ctx, args)).catch_unwind().await;

        let cleanup = if context::exit() == 0 {
            self.finish_member(&payload.jid).await
        } else {
            Ok(())
        };

        match outcome {
            Err(panic) => resume_unwind(panic),
            Ok(Err(e)) => Err(job_failed(e)),
            Ok(Ok(())) => cleanup,
        }
    }

    async fn finish_member(&self, job_id: &str) -> BatchResult<()> {
        let tracked = context::current().and_then(|ds| ds.batch_info().map(|info| (ds, info)));
        self.clear_datastore(tracked.as_ref().map(|(_, info)| info.id.as_str()));

        let Some((datastore, info)) = tracked else {
            return Ok(());
        };

        let token = members::job_token(job_id);
        let completed = match self.release_member(&info.id, &token).await {
            Some(removal) if removal.completes_batch() => {
                self.complete_batch(&info.id, datastore.clone()).await
            }
            _ => Ok(()),
        };

        let job_completed = self
            .inner
            .dispatcher
            .dispatch(
                &info,
                CallbackInvocation::JobComplete {
                    job_id: job_id.to_string(),
                    datastore,
                },
            )
            .await;

        completed.and(job_completed)
    }

    /// Remove a member, swallowing counter store failures
    async fn release_member(&self, batch_id: &str, token: &str) -> Option<MemberRemoval> {
        match self.inner.store.remove_member(batch_id, token).await {
            Ok(removal) => {
                log_member!(
                    debug,
                    "REMOVE",
                    batch_id: batch_id,
                    token: token,
                    removed: removal.removed,
                    remaining: removal.remaining,
                );
                Some(removal)
            }
            Err(e) => {
                warn!(
                    batch_id = %batch_id,
                    token = %token,
                    error = %e,
                    "Failed to remove batch member, completion for this member is unknown"
                );
                None
            }
        }
    }

    async fn complete_batch(&self, batch_id: &str, datastore: Datastore) -> BatchResult<()> {
        if let Err(e) = self.inner.store.delete(batch_id).await {
            warn!(batch_id = %batch_id, error = %e, "Failed to delete completed batch");
        }
        log_batch!(info, "COMPLETE", batch_id: batch_id,);

        let Some(info) = datastore.batch_info() else {
            return Ok(());
        };
        self.inner
            .dispatcher
            .dispatch(&info, CallbackInvocation::Complete { datastore })
            .await
    }

    /// Clear the datastore now, or when the open transaction resolves
    ///
    /// A deferred clear only drops the datastore of `batch_id`; by the time the
    /// transaction resolves the slot may hold another batch's datastore.
    fn clear_datastore(&self, batch_id: Option<&str>) {
        let Some(batch_id) = batch_id.filter(|_| self.inner.transactions.transaction_open())
        else {
            context::clear();
            return;
        };

        let on_commit = batch_id.to_string();
        let on_rollback = batch_id.to_string();
        let deferred = TransactionCallback::new()
            .after_commit(move || async move {
                context::release(&on_commit);
                Ok(())
            })
            .after_rollback(move || context::release(&on_rollback));
        if let Err(e) = self.inner.transactions.register_callback(deferred) {
            debug!(error = %e, "Could not defer datastore clear, clearing now");
            context::clear();
        }
    }
}

/// Datastore to hand to `complete`: the live one if it still carries batch info
fn session_snapshot(fallback: Datastore) -> Datastore {
    context::current()
        .filter(|ds| ds.batch_info().is_some())
        .unwrap_or(fallback)
}

/// Releases a session whose future is dropped before its block finishes
///
/// Drop cannot await, so the membership removal (and `complete`, if that
/// empties the batch) runs on a spawned task.
struct SessionGuard {
    tracker: Option<BatchTracker>,
    batch_id: String,
    token: String,
    datastore: Datastore,
}

impl SessionGuard {
    fn disarm(&mut self) {
        self.tracker = None;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(tracker) = self.tracker.take() else {
            return;
        };

        let snapshot = session_snapshot(std::mem::take(&mut self.datastore));
        context::exit();
        context::clear();

        let batch_id = std::mem::take(&mut self.batch_id);
        let token = std::mem::take(&mut self.token);
        log_batch!(warn, "CANCELLED", batch_id: batch_id,);

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!(batch_id = %batch_id, "No runtime to release cancelled batch session");
            return;
        };
        handle.spawn(async move {
            let removal = tracker.release_member(&batch_id, &token).await;
            if removal.is_some_and(|removal| removal.completes_batch()) {
                if let Err(e) = tracker.complete_batch(&batch_id, snapshot).await {
                    warn!(batch_id = %batch_id, error = %e, "Completion of cancelled batch failed");
                }
            }
        });
    }
}
