//! Job queue interface and the in-process queue

use super::payload::JobPayload;
use crate::config::JobPlatform;
use crate::error::{BatchError, BatchResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::Notify;
use tracing::debug;

/// Enqueue side of a host job system
#[async_trait]
pub trait JobQueue: Send + Sync {
    fn name(&self) -> &str;

    /// Wire layout this queue expects
    fn platform(&self) -> JobPlatform;

    /// Hand a serialized payload to the queue
    async fn push(&self, payload: Value) -> BatchResult<()>;
}

/// Process-local FIFO queue
///
/// Entries are stored as serialized JSON so that nothing crosses from the
/// dispatching task to the worker except by value.
#[derive(Debug)]
pub struct InMemoryQueue {
    name: String,
    platform: JobPlatform,
    entries: Mutex<VecDeque<String>>,
    notify: Notify,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>, platform: JobPlatform) -> Self {
        Self {
            name: name.into(),
            platform,
            entries: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    /// Take the next payload without waiting
    pub fn try_pop(&self) -> Option<BatchResult<JobPayload>> {
        let raw = self.entries.lock().pop_front()?;
        Some(decode(&raw))
    }

    /// Wait for the next payload
    pub async fn pop(&self) -> BatchResult<JobPayload> {
        loop {
            if let Some(payload) = self.try_pop() {
                return payload;
            }
            self.notify.notified().await;
        }
    }

    /// Serialized entries still waiting, oldest first
    pub fn pending(&self) -> Vec<Value> {
        self.entries
            .lock()
            .iter()
            .filter_map(|raw| serde_json::from_str(raw).ok())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

fn decode(raw: &str) -> BatchResult<JobPayload> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| BatchError::InvalidPayload(format!("queue entry is not JSON: {e}")))?;
    JobPayload::from_wire(&value)
}

#[async_trait]
impl JobQueue for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    fn platform(&self) -> JobPlatform {
        self.platform
    }

    async fn push(&self, payload: Value) -> BatchResult<()> {
        let raw = serde_json::to_string(&payload)?;
        self.entries.lock().push_back(raw);
        self.notify.notify_one();
        debug!(queue = %self.name, "Job payload enqueued");
        Ok(())
    }
}
