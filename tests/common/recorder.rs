//! Recording batch callback

use async_trait::async_trait;
use batch_tracker::{BatchCallback, Datastore};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Complete(Datastore),
    JobComplete(String, Datastore),
}

/// Callback that remembers every invocation; clones share the log
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Recorded>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Recorded> {
        self.events.lock().clone()
    }

    /// Datastores passed to `complete`
    pub fn completes(&self) -> Vec<Datastore> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Recorded::Complete(ds) => Some(ds.clone()),
                Recorded::JobComplete(..) => None,
            })
            .collect()
    }

    /// Job ids passed to `job_complete`
    pub fn job_completes(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                Recorded::JobComplete(job_id, _) => Some(job_id.clone()),
                Recorded::Complete(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl BatchCallback for Recorder {
    async fn complete(&self, datastore: &Datastore) -> anyhow::Result<()> {
        self.events.lock().push(Recorded::Complete(datastore.clone()));
        Ok(())
    }

    async fn job_complete(&self, job_id: &str, datastore: &Datastore) -> anyhow::Result<()> {
        self.events
            .lock()
            .push(Recorded::JobComplete(job_id.to_string(), datastore.clone()));
        Ok(())
    }
}

/// Callback whose `complete` always fails
#[derive(Debug, Default)]
pub struct Exploding;

#[async_trait]
impl BatchCallback for Exploding {
    async fn complete(&self, _datastore: &Datastore) -> anyhow::Result<()> {
        anyhow::bail!("completion handler exploded")
    }
}
