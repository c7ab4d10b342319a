//! # Execution Context
//!
//! Per-task state for code running inside a batch: the datastore slot, the
//! re-entrancy depth of tracked units of work, and the stack of open
//! transaction frames.
//!
//! The context is a `tokio` task-local. It is never shared between tasks; a
//! spawned task starts without one, and a job executed by a worker gets a fresh
//! context (see [`isolated`]) populated from its payload. Entry points of this
//! crate call [`ensure_scope`] so callers do not need to install one explicitly.
//!
//! No borrow of the context is ever held across an `.await`.

pub mod datastore;

pub use datastore::{BatchInfo, Caller, Datastore};

use crate::transaction::TransactionFrame;
use parking_lot::Mutex;
use std::cell::RefCell;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static EXECUTION_CONTEXT: RefCell<ExecutionContext>;
}

#[derive(Default)]
pub(crate) struct ExecutionContext {
    datastore: Option<Datastore>,
    depth: u32,
    /// Open transaction frames, shared with isolated child contexts
    pub(crate) transactions: Arc<Mutex<Vec<TransactionFrame>>>,
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("datastore", &self.datastore)
            .field("depth", &self.depth)
            .field("open_transactions", &self.transactions.lock().len())
            .finish()
    }
}

/// Run `fut` with a fresh, empty execution context
pub async fn scope<F: Future>(fut: F) -> F::Output {
    EXECUTION_CONTEXT
        .scope(RefCell::new(ExecutionContext::default()), fut)
        .await
}

/// Run `fut` in the current execution context, installing one if absent
pub async fn ensure_scope<F: Future>(fut: F) -> F::Output {
    if in_scope() {
        fut.await
    } else {
        scope(fut).await
    }
}

/// Run `fut` with an empty datastore and zero depth
///
/// Transactions open on the current context stay open inside `fut`, so work
/// done there still commits or rolls back with them.
pub async fn isolated<F: Future>(fut: F) -> F::Output {
    let transactions = with_context(|ctx| ctx.transactions.clone()).unwrap_or_default();
    let fresh = ExecutionContext {
        transactions,
        ..Default::default()
    };
    EXECUTION_CONTEXT.scope(RefCell::new(fresh), fut).await
}

/// Whether the current task has an execution context
pub fn in_scope() -> bool {
    EXECUTION_CONTEXT.try_with(|_| ()).is_ok()
}

pub(crate) fn with_context<R>(f: impl FnOnce(&mut ExecutionContext) -> R) -> Option<R> {
    EXECUTION_CONTEXT
        .try_with(|cell| f(&mut cell.borrow_mut()))
        .ok()
}

/// Snapshot of the current datastore
pub fn current() -> Option<Datastore> {
    with_context(|ctx| ctx.datastore.clone()).flatten()
}

/// Read the current datastore without cloning it
pub fn with_datastore<R>(f: impl FnOnce(&Datastore) -> R) -> Option<R> {
    with_context(|ctx| ctx.datastore.as_ref().map(f)).flatten()
}

/// Mutate the current datastore in place
pub fn with_datastore_mut<R>(f: impl FnOnce(&mut Datastore) -> R) -> Option<R> {
    with_context(|ctx| ctx.datastore.as_mut().map(f)).flatten()
}

/// Install `datastore` as current; `false` when there is no execution context
pub fn set(datastore: Datastore) -> bool {
    with_context(|ctx| ctx.datastore = Some(datastore)).is_some()
}

/// Reset the datastore slot to empty
pub fn clear() {
    with_context(|ctx| ctx.datastore = None);
}

/// Clear the datastore if it still belongs to `batch_id` and nothing is running
pub(crate) fn release(batch_id: &str) {
    with_context(|ctx| {
        let owned = ctx
            .datastore
            .as_ref()
            .and_then(Datastore::batch_info)
            .is_some_and(|info| info.id == batch_id);
        if ctx.depth == 0 && owned {
            ctx.datastore = None;
        }
    });
}

/// Current nesting depth of tracked units of work
pub fn depth() -> u32 {
    with_context(|ctx| ctx.depth).unwrap_or(0)
}

/// Increment the nesting depth and return the new value
pub(crate) fn enter() -> u32 {
    with_context(|ctx| {
        ctx.depth += 1;
        ctx.depth
    })
    .unwrap_or(0)
}

/// Decrement the nesting depth and return the new value
pub(crate) fn exit() -> u32 {
    with_context(|ctx| {
        ctx.depth = ctx.depth.saturating_sub(1);
        ctx.depth
    })
    .unwrap_or(0)
}
