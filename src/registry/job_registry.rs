//! Job registry

use crate::jobs::Job;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Thread-safe mapping from job class name to implementation
#[derive(Clone, Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<String, Arc<dyn Job>>>>,
}

impl std::fmt::Debug for JobRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobRegistry")
            .field("classes", &self.classes())
            .finish()
    }
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<J>(&self, class: impl Into<String>)
    where
        J: Job + Default + 'static,
    {
        self.register_instance(class, Arc::new(J::default()));
    }

    pub fn register_instance(&self, class: impl Into<String>, job: Arc<dyn Job>) {
        let class = class.into();
        debug!(job_class = %class, "Registering job class");
        self.jobs.write().insert(class, job);
    }

    pub fn resolve(&self, class: &str) -> Option<Arc<dyn Job>> {
        self.jobs.read().get(class).cloned()
    }

    pub fn is_registered(&self, class: &str) -> bool {
        self.jobs.read().contains_key(class)
    }

    /// Registered class names, sorted
    pub fn classes(&self) -> Vec<String> {
        let mut classes: Vec<String> = self.jobs.read().keys().cloned().collect();
        classes.sort();
        classes
    }
}
