//! # Deferred Callback Dispatch
//!
//! Invokes a batch's registered callbacks for `complete` and `job_complete`.
//! When a transaction is open on the calling context the invocation is
//! registered as an after-commit handler instead, so user callbacks never
//! observe uncommitted state; on rollback they do not run at all.
//!
//! Callback names come from [`BatchInfo::callbacks`] and are resolved through
//! the [`CallbackRegistry`] only when the invocation actually runs. Names that
//! do not resolve are skipped. Callback errors are not swallowed.

use crate::constants::CallbackEvent;
use crate::context::{BatchInfo, Datastore};
use crate::error::{BatchError, BatchResult};
use crate::transaction::{TransactionCallback, TransactionManager};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

pub use crate::registry::CallbackRegistry;

/// A batch callback
///
/// Both hooks default to doing nothing, which is how a callback opts out of
/// an event.
#[async_trait]
pub trait BatchCallback: Send + Sync {
    /// The last member of the batch has exited
    async fn complete(&self, datastore: &Datastore) -> anyhow::Result<()> {
        let _ = datastore;
        Ok(())
    }

    /// One tracked job has exited
    async fn job_complete(&self, job_id: &str, datastore: &Datastore) -> anyhow::Result<()> {
        let _ = (job_id, datastore);
        Ok(())
    }
}

/// An event together with its arguments
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackInvocation {
    Complete { datastore: Datastore },
    JobComplete { job_id: String, datastore: Datastore },
}

impl CallbackInvocation {
    pub fn event(&self) -> CallbackEvent {
        match self {
            Self::Complete { .. } => CallbackEvent::Complete,
            Self::JobComplete { .. } => CallbackEvent::JobComplete,
        }
    }

    async fn invoke(&self, callback: &dyn BatchCallback) -> anyhow::Result<()> {
        match self {
            Self::Complete { datastore } => callback.complete(datastore).await,
            Self::JobComplete { job_id, datastore } => {
                callback.job_complete(job_id, datastore).await
            }
        }
    }
}

/// Resolves and invokes callbacks, deferring to transaction commit when needed
#[derive(Clone)]
pub struct CallbackDispatcher {
    registry: CallbackRegistry,
    transactions: Arc<dyn TransactionManager>,
}

impl std::fmt::Debug for CallbackDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallbackDispatcher")
            .field("registry", &self.registry)
            .finish()
    }
}

impl CallbackDispatcher {
    pub fn new(registry: CallbackRegistry, transactions: Arc<dyn TransactionManager>) -> Self {
        Self {
            registry,
            transactions,
        }
    }

    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// Dispatch `invocation` to every callback of `info`
    ///
    /// Returns after invoking when no transaction is open, otherwise as soon as
    /// the invocation is registered against the open transaction.
    pub async fn dispatch(&self, info: &BatchInfo, invocation: CallbackInvocation) -> BatchResult<()> {
        if info.callbacks.is_empty() {
            return Ok(());
        }

        if self.transactions.transaction_open() {
            debug!(
                batch_id = %info.id,
                event = %invocation.event(),
                "Transaction open, deferring callbacks until commit"
            );
            let registry = self.registry.clone();
            let names = info.callbacks.clone();
            return self.transactions.register_callback(
                TransactionCallback::new().after_commit(move || async move {
                    invoke_all(&registry, &names, &invocation).await
                }),
            );
        }

        invoke_all(&self.registry, &info.callbacks, &invocation).await
    }
}

async fn invoke_all(
    registry: &CallbackRegistry,
    names: &[String],
    invocation: &CallbackInvocation,
) -> BatchResult<()> {
    let event = invocation.event();
    for name in names {
        let Some(callback) = registry.resolve(name) else {
            debug!(callback = %name, event = %event, "Callback not registered, skipping");
            continue;
        };

        invocation
            .invoke(callback.as_ref())
            .await
            .map_err(|e| BatchError::CallbackError {
                callback: name.clone(),
                event,
                reason: format!("{e:#}"),
            })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{self, Caller};
    use crate::transaction::{self, ContextTransactions};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        events: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BatchCallback for Recording {
        async fn complete(&self, _datastore: &Datastore) -> anyhow::Result<()> {
            self.events.lock().push("complete".to_string());
            Ok(())
        }

        async fn job_complete(&self, job_id: &str, _datastore: &Datastore) -> anyhow::Result<()> {
            self.events.lock().push(format!("job_complete:{job_id}"));
            Ok(())
        }
    }

    #[derive(Default)]
    struct OnlyJobs;

    #[async_trait]
    impl BatchCallback for OnlyJobs {
        async fn job_complete(&self, _job_id: &str, _datastore: &Datastore) -> anyhow::Result<()> {
            anyhow::bail!("job hook exploded")
        }
    }

    fn setup() -> (CallbackDispatcher, Arc<Recording>, BatchInfo) {
        let registry = CallbackRegistry::new();
        let recording = Arc::new(Recording::default());
        registry.register_instance("Recording", recording.clone());
        registry.register::<OnlyJobs>("OnlyJobs");

        let mut info = BatchInfo::new("b1", Caller::anonymous());
        info.callbacks = vec!["Missing".to_string(), "Recording".to_string()];

        let dispatcher = CallbackDispatcher::new(registry, Arc::new(ContextTransactions));
        (dispatcher, recording, info)
    }

    fn complete() -> CallbackInvocation {
        CallbackInvocation::Complete {
            datastore: Datastore::new(),
        }
    }

    #[tokio::test]
    async fn test_immediate_dispatch_skips_unresolved_names() {
        let (dispatcher, recording, info) = setup();

        dispatcher.dispatch(&info, complete()).await.unwrap();
        dispatcher
            .dispatch(
                &info,
                CallbackInvocation::JobComplete {
                    job_id: "j1".to_string(),
                    datastore: Datastore::new(),
                },
            )
            .await
            .unwrap();

        assert_eq!(*recording.events.lock(), vec!["complete", "job_complete:j1"]);
    }

    #[tokio::test]
    async fn test_default_hooks_are_noops_and_errors_propagate() {
        let (dispatcher, _recording, mut info) = setup();
        info.callbacks = vec!["OnlyJobs".to_string()];

        dispatcher.dispatch(&info, complete()).await.unwrap();

        let err = dispatcher
            .dispatch(
                &info,
                CallbackInvocation::JobComplete {
                    job_id: "j1".to_string(),
                    datastore: Datastore::new(),
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BatchError::CallbackError {
                callback: "OnlyJobs".to_string(),
                event: CallbackEvent::JobComplete,
                reason: "job hook exploded".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_dispatch_deferred_until_commit() {
        let (dispatcher, recording, info) = setup();

        let result: BatchResult<()> = transaction::run(async {
            dispatcher.dispatch(&info, complete()).await?;
            assert!(recording.events.lock().is_empty());
            Ok::<_, BatchError>(())
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(*recording.events.lock(), vec!["complete"]);
    }

    #[tokio::test]
    async fn test_dispatch_skipped_on_rollback() {
        let (dispatcher, recording, info) = setup();

        context::scope(async {
            let result: BatchResult<()> = transaction::run(async {
                dispatcher.dispatch(&info, complete()).await?;
                Err(BatchError::DatabaseError("rolled back".to_string()))
            })
            .await;
            assert!(result.is_err());
        })
        .await;

        assert!(recording.events.lock().is_empty());
    }
}
