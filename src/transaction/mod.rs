//! # Transaction Hooks
//!
//! Side effects that must not observe uncommitted state (batch callbacks,
//! datastore clearing) are deferred until the surrounding relational
//! transaction commits, or dropped when it rolls back.
//!
//! The tracker talks to the transaction manager only through
//! [`TransactionManager`]. [`ContextTransactions`] is the default
//! implementation: open transactions are frames on the task's execution
//! context, driven either by [`run`] or by the PostgreSQL adapter in
//! [`postgres`].
//!
//! ```rust,no_run
//! use batch_tracker::transaction;
//! use batch_tracker::BatchResult;
//!
//! # async fn example() -> BatchResult<()> {
//! transaction::run(async {
//!     // callbacks registered in here fire only if this returns Ok
//!     Ok::<_, batch_tracker::BatchError>(())
//! })
//! .await
//! # }
//! ```

#[cfg(feature = "postgres")]
pub mod postgres;

use crate::context;
use crate::error::{BatchError, BatchResult};
use futures::future::BoxFuture;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Deferred async side effect
pub type CommitHook = Box<dyn FnOnce() -> BoxFuture<'static, BatchResult<()>> + Send>;

/// Deferred side effect run when a transaction rolls back
pub type RollbackHook = Box<dyn FnOnce() + Send>;

/// Handlers attached to an open transaction
#[derive(Default)]
pub struct TransactionCallback {
    before_commit: Option<CommitHook>,
    after_commit: Option<CommitHook>,
    after_rollback: Option<RollbackHook>,
}

impl std::fmt::Debug for TransactionCallback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionCallback")
            .field("before_commit", &self.before_commit.is_some())
            .field("after_commit", &self.after_commit.is_some())
            .field("after_rollback", &self.after_rollback.is_some())
            .finish()
    }
}

impl TransactionCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn before_commit<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = BatchResult<()>> + Send + 'static,
    {
        self.before_commit = Some(Box::new(move || Box::pin(hook())));
        self
    }

    pub fn after_commit<F, Fut>(mut self, hook: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = BatchResult<()>> + Send + 'static,
    {
        self.after_commit = Some(Box::new(move || Box::pin(hook())));
        self
    }

    pub fn after_rollback<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.after_rollback = Some(Box::new(hook));
        self
    }
}

/// Interface to the relational-transaction manager
pub trait TransactionManager: Send + Sync {
    /// Whether a transaction is open on the calling context
    fn transaction_open(&self) -> bool;

    /// Attach handlers to the innermost open transaction
    fn register_callback(&self, callback: TransactionCallback) -> BatchResult<()>;
}

/// Transaction frames kept on the task's execution context
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextTransactions;

impl TransactionManager for ContextTransactions {
    fn transaction_open(&self) -> bool {
        context::with_context(|ctx| !ctx.transactions.lock().is_empty()).unwrap_or(false)
    }

    fn register_callback(&self, callback: TransactionCallback) -> BatchResult<()> {
        context::with_context(move |ctx| {
            let mut frames = ctx.transactions.lock();
            let Some(frame) = frames.last_mut() else {
                return Err(BatchError::TransactionError(
                    "no transaction is open on this context".to_string(),
                ));
            };
            frame.callbacks.push(callback);
            Ok(())
        })
        .unwrap_or_else(|| {
            Err(BatchError::TransactionError(
                "no execution context on this task".to_string(),
            ))
        })
    }
}

static NEXT_FRAME_ID: AtomicU64 = AtomicU64::new(1);

/// One open transaction and the handlers registered against it
pub(crate) struct TransactionFrame {
    id: u64,
    callbacks: Vec<TransactionCallback>,
}

/// Open a frame on the current context
pub(crate) fn begin_frame() -> Option<u64> {
    let id = NEXT_FRAME_ID.fetch_add(1, Ordering::Relaxed);
    context::with_context(|ctx| {
        ctx.transactions.lock().push(TransactionFrame {
            id,
            callbacks: Vec::new(),
        });
        id
    })
}

/// Detach a frame from the current context
pub(crate) fn take_frame(id: u64) -> Option<TransactionFrame> {
    context::with_context(|ctx| {
        let mut frames = ctx.transactions.lock();
        let position = frames.iter().rposition(|frame| frame.id == id)?;
        Some(frames.remove(position))
    })
    .flatten()
}

/// Resolve where a committed frame's handlers go
///
/// A nested frame hands its handlers to the enclosing frame and returns
/// `None`; only the outermost commit runs them.
pub(crate) fn prepare_commit(frame: TransactionFrame) -> Option<Vec<TransactionCallback>> {
    let callbacks = frame.callbacks;
    context::with_context(move |ctx| {
        let mut frames = ctx.transactions.lock();
        let Some(parent) = frames.last_mut() else {
            return Some(callbacks);
        };
        parent.callbacks.extend(callbacks);
        None
    })
    .flatten()
}

/// Run every before-commit hook, returning the first failure
pub(crate) async fn run_before_commit(callbacks: &mut [TransactionCallback]) -> BatchResult<()> {
    let mut first_error = None;
    for callback in callbacks.iter_mut() {
        if let Some(hook) = callback.before_commit.take() {
            if let Err(e) = hook().await {
                first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Run every after-commit hook, returning the first failure
pub(crate) async fn run_after_commit(callbacks: Vec<TransactionCallback>) -> BatchResult<()> {
    debug!(handlers = callbacks.len(), "Running after-commit handlers");
    let mut first_error = None;
    for callback in callbacks {
        if let Some(hook) = callback.after_commit {
            if let Err(e) = hook().await {
                first_error.get_or_insert(e);
            }
        }
    }
    first_error.map_or(Ok(()), Err)
}

/// Run every after-rollback hook of a frame
pub(crate) fn run_rollback(frame: TransactionFrame) {
    run_rollback_hooks(frame.callbacks);
}

pub(crate) fn run_rollback_hooks(callbacks: Vec<TransactionCallback>) {
    debug!(handlers = callbacks.len(), "Running after-rollback handlers");
    for callback in callbacks {
        if let Some(hook) = callback.after_rollback {
            hook();
        }
    }
}

/// Rolls the frame back if dropped before it is resolved
struct FrameGuard {
    id: Option<u64>,
}

impl FrameGuard {
    fn take(&mut self) -> Option<TransactionFrame> {
        self.id.take().and_then(take_frame)
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        if let Some(frame) = self.take() {
            run_rollback(frame);
        }
    }
}

/// Run `fut` as a transaction on the current execution context
///
/// `Ok` commits: before-commit then after-commit handlers run (or move to the
/// enclosing transaction when nested). `Err` rolls back: after-rollback
/// handlers run and the error is returned unchanged.
pub async fn run<F, T, E>(fut: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: From<BatchError>,
{
    context::ensure_scope(async move {
        let mut guard = FrameGuard { id: begin_frame() };
        let result = fut.await;
        let frame = guard.take();

        match result {
            Ok(value) => {
                if let Some(mut callbacks) = frame.and_then(prepare_commit) {
                    if let Err(e) = run_before_commit(&mut callbacks).await {
                        run_rollback_hooks(callbacks);
                        return Err(E::from(e));
                    }
                    run_after_commit(callbacks).await.map_err(E::from)?;
                }
                Ok(value)
            }
            Err(e) => {
                if let Some(frame) = frame {
                    run_rollback(frame);
                }
                Err(e)
            }
        }
    })
    .await
}
