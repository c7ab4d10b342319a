//! Error types for the batch tracker.
//!

use crate::config::ConfigurationError;
use crate::constants::CallbackEvent;
use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BatchError {
    #[error("Counter store error: {0}")]
    StoreError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Callback {callback} failed during {event}: {reason}")]
    CallbackError {
        callback: String,
        event: CallbackEvent,
        reason: String,
    },
    #[error("Job {job_class} ({job_id}) failed: {reason}")]
    JobFailed {
        job_class: String,
        job_id: String,
        reason: String,
    },
    #[error("Unknown job class: {0}")]
    UnknownJob(String),
    #[error("Queue error: {0}")]
    QueueError(String),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("Transaction error: {0}")]
    TransactionError(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<StoreError> for BatchError {
    fn from(error: StoreError) -> Self {
        BatchError::StoreError(error.to_string())
    }
}

impl From<ConfigurationError> for BatchError {
    fn from(error: ConfigurationError) -> Self {
        BatchError::ConfigurationError(error.to_string())
    }
}

impl From<serde_json::Error> for BatchError {
    fn from(error: serde_json::Error) -> Self {
        BatchError::SerializationError(format!("JSON serialization error: {error}"))
    }
}

#[cfg(feature = "postgres")]
impl From<sqlx::Error> for BatchError {
    fn from(err: sqlx::Error) -> Self {
        BatchError::DatabaseError(err.to_string())
    }
}

pub type BatchResult<T> = std::result::Result<T, BatchError>;
