#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, ActiveJob in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Batch Tracker
//!
//! Completion tracking for batches of background jobs.
//!
//! ## Overview
//!
//! A batch is a logical unit of work made of an arbitrary tree of jobs that
//! may run on different workers, queues and processes, and may enqueue more
//! jobs themselves. Every outstanding piece of work is a member of the
//! batch's set in a shared counter store; the member whose removal leaves the
//! set empty fires the batch's `complete` callbacks, exactly once. Each
//! tracked job also fires `job_complete` when it exits.
//!
//! A shared JSON datastore travels with the batch. It is installed on the
//! task-local execution context of the session and of every tracked job,
//! crossing job boundaries embedded in the serialized job arguments.
//!
//! ## Module Organization
//!
//! - [`batch`] - `BatchTracker`, batch sessions and datastore accessors
//! - [`jobs`] - job, queue and worker seams, payload wire formats
//! - [`callbacks`] - batch callbacks and deferred dispatch
//! - [`transaction`] - commit/rollback deferral of side effects
//! - [`store`] - shared counter store backends
//! - [`context`] - task-local execution context and datastore
//! - [`registry`] - name-to-factory registries for callbacks and jobs
//! - [`config`] - configuration loading
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_tracker::jobs::{InMemoryQueue, Job, JobContext, Worker};
//! use batch_tracker::{batch, BatchError, BatchTracker, JobPlatform};
//! use serde_json::{json, Map, Value};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct ResizeImage;
//!
//! #[async_trait::async_trait]
//! impl Job for ResizeImage {
//!     async fn perform(&self, _ctx: &JobContext, _args: Vec<Value>) -> anyhow::Result<()> {
//!         let _album = batch::get(&["album_id"]);
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), BatchError> {
//! let tracker = BatchTracker::builder().build();
//! tracker.register_job::<ResizeImage>("ResizeImage");
//! let queue = Arc::new(InMemoryQueue::new("images", JobPlatform::Sidekiq));
//!
//! let mut seed = Map::new();
//! seed.insert("album_id".to_string(), json!(12));
//! tracker
//!     .start(seed, async {
//!         batch::add_callback("AlbumReady");
//!         for image in 0..3 {
//!             tracker.dispatch(&*queue, "ResizeImage", vec![json!(image)]).await?;
//!         }
//!         Ok::<_, BatchError>(())
//!     })
//!     .await?;
//!
//! Worker::new(tracker.clone(), queue).run_until_idle().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib                        # Unit tests
//! cargo test                              # All tests
//! cargo test --features test-services     # Include Redis and PostgreSQL tests
//! ```

pub mod batch;
pub mod callbacks;
pub mod config;
pub mod constants;
pub mod context;
pub mod error;
pub mod jobs;
pub mod logging;
pub mod registry;
pub mod store;
pub mod transaction;

// Paths used by the exported logging macros
#[doc(hidden)]
pub mod __private {
    pub use chrono;
    pub use tracing;
}

pub use batch::{BatchTracker, BatchTrackerBuilder};
pub use callbacks::{BatchCallback, CallbackDispatcher, CallbackInvocation, CallbackRegistry};
pub use config::{BatchConfig, ConfigManager, JobPlatform, StoreConfig};
pub use constants::{CallbackEvent, DATASTORE_MARKER};
pub use context::{BatchInfo, Caller, Datastore};
pub use error::{BatchError, BatchResult};
pub use jobs::{InMemoryQueue, Job, JobContext, JobHandle, JobPayload, JobQueue, JobRegistry};
pub use logging::init_structured_logging;
pub use store::{CounterStore, MemberRemoval, StoreError};
pub use transaction::{ContextTransactions, TransactionCallback, TransactionManager};
