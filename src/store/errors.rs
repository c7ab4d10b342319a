//! Counter store error types

use thiserror::Error;

/// Errors that can occur while talking to the counter store
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Failed to reach the store backend
    #[error("Counter store connection error: {0}")]
    ConnectionError(String),

    /// Backend rejected or failed a command
    #[error("Counter store backend error: {0}")]
    BackendError(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
