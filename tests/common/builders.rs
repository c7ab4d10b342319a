//! Tracker builders

use super::jobs::{FailingJob, FanOutJob, NoopJob, PanickingJob, ObserveJob, ReportJob};
use super::recorder::{Exploding, Recorder};
use batch_tracker::jobs::InMemoryQueue;
use batch_tracker::store::InMemoryMemberStore;
use batch_tracker::{BatchTracker, CounterStore, JobPlatform};
use serde_json::{Map, Value};
use std::sync::Arc;

/// A tracker over an inspectable in-memory store, with every test job
/// registered and `AuditJob` on the ignore-list
pub struct Harness {
    pub tracker: BatchTracker,
    pub memory: InMemoryMemberStore,
    pub recorder: Recorder,
    pub observer: ObserveJob,
    pub queue: Arc<InMemoryQueue>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_platform(JobPlatform::ActiveJob)
    }

    pub fn with_platform(platform: JobPlatform) -> Self {
        let memory = InMemoryMemberStore::new();
        let tracker = BatchTracker::builder()
            .store(CounterStore::with_memory(memory.clone()))
            .ignore("AuditJob")
            .build();

        let recorder = Recorder::default();
        tracker
            .callbacks()
            .register_instance("Recorder", Arc::new(recorder.clone()));
        tracker.register_callback::<Exploding>("Exploding");

        let observer = ObserveJob::default();
        tracker.jobs().register_instance("ObserveJob", Arc::new(observer.clone()));
        tracker.jobs().register_instance("AuditJob", Arc::new(observer.clone()));
        tracker.register_job::<NoopJob>("NoopJob");
        tracker.register_job::<FanOutJob>("FanOutJob");
        tracker.register_job::<FailingJob>("FailingJob");
        tracker.register_job::<PanickingJob>("PanickingJob");
        tracker.register_job::<ReportJob>("ReportJob");

        Self {
            tracker,
            memory,
            recorder,
            observer,
            queue: Arc::new(InMemoryQueue::new("default", platform)),
        }
    }

    /// Tracker sharing this harness's registries but with a dead counter store
    pub fn disconnected_tracker(&self) -> BatchTracker {
        BatchTracker::builder()
            .store(CounterStore::unavailable("connection refused"))
            .callbacks(self.tracker.callbacks().clone())
            .jobs(self.tracker.jobs().clone())
            .build()
    }

    pub fn members(&self, batch_id: &str) -> Vec<String> {
        self.memory.members(&format!("servitium:batch:{batch_id}"))
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

/// Seed datastore from a JSON object literal
pub fn seed(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
