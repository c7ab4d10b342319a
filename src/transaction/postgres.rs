//! PostgreSQL transaction adapter
//!
//! [`TrackedTransaction`] wraps a `sqlx` transaction and opens a frame on the
//! execution context for its lifetime, so handlers registered through
//! [`ContextTransactions`](super::ContextTransactions) follow the database
//! commit or rollback.

use super::{
    begin_frame, prepare_commit, run_after_commit, run_before_commit, run_rollback,
    run_rollback_hooks, take_frame,
};
use crate::error::{BatchError, BatchResult};
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, warn};

/// A database transaction whose commit drives deferred batch side effects
///
/// Must be created inside an execution context (see
/// [`context::scope`](crate::context::scope)). Dropping it without calling
/// [`commit`](Self::commit) rolls back both the database transaction and the
/// frame.
pub struct TrackedTransaction {
    tx: Option<Transaction<'static, Postgres>>,
    frame_id: Option<u64>,
}

impl std::fmt::Debug for TrackedTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedTransaction")
            .field("open", &self.tx.is_some())
            .field("frame_id", &self.frame_id)
            .finish()
    }
}

impl TrackedTransaction {
    /// Begin a transaction on `pool`
    pub async fn begin(pool: &PgPool) -> BatchResult<Self> {
        let tx = pool.begin().await?;
        let frame_id = begin_frame().ok_or_else(|| {
            BatchError::TransactionError(
                "TrackedTransaction requires an execution context".to_string(),
            )
        })?;

        debug!(frame_id = frame_id, "Tracked transaction opened");
        Ok(Self {
            tx: Some(tx),
            frame_id: Some(frame_id),
        })
    }

    /// Underlying connection for running queries
    pub fn transaction_mut(&mut self) -> BatchResult<&mut Transaction<'static, Postgres>> {
        self.tx
            .as_mut()
            .ok_or_else(|| BatchError::TransactionError("transaction already finished".to_string()))
    }

    /// Commit the database transaction, then run after-commit handlers
    ///
    /// When another tracked frame is still open on this context the handlers
    /// move to it instead of running.
    pub async fn commit(mut self) -> BatchResult<()> {
        let tx = self.tx.take().ok_or_else(|| {
            BatchError::TransactionError("transaction already finished".to_string())
        })?;
        let frame = self.frame_id.take().and_then(take_frame);
        let callbacks = frame.and_then(prepare_commit);

        let Some(mut callbacks) = callbacks else {
            tx.commit().await?;
            return Ok(());
        };

        if let Err(e) = run_before_commit(&mut callbacks).await {
            run_rollback_hooks(callbacks);
            if let Err(rollback_error) = tx.rollback().await {
                warn!(error = %rollback_error, "Rollback after failed before-commit handler failed");
            }
            return Err(e);
        }

        if let Err(e) = tx.commit().await {
            run_rollback_hooks(callbacks);
            return Err(e.into());
        }

        run_after_commit(callbacks).await
    }

    /// Roll back the database transaction and run after-rollback handlers
    pub async fn rollback(mut self) -> BatchResult<()> {
        if let Some(frame) = self.frame_id.take().and_then(take_frame) {
            run_rollback(frame);
        }
        match self.tx.take() {
            Some(tx) => Ok(tx.rollback().await?),
            None => Ok(()),
        }
    }
}

impl Drop for TrackedTransaction {
    fn drop(&mut self) {
        if let Some(frame) = self.frame_id.take().and_then(take_frame) {
            debug!("Tracked transaction dropped without commit, rolling back");
            run_rollback(frame);
        }
    }
}
