//! # Batch Session
//!
//! [`BatchTracker::start`] opens a batch on the current execution context,
//! and the free functions here read and write the active batch's datastore.
//! Outside a batch every accessor is a no-op.
//!
//! A batch is active while a tracked unit of work is running (nesting depth
//! above zero) and the datastore carries a valid `batch_info`.
//!
//! ```rust,no_run
//! use batch_tracker::{batch, BatchError, BatchTracker};
//! use serde_json::{json, Map};
//!
//! # async fn example(tracker: BatchTracker) -> Result<(), BatchError> {
//! let mut seed = Map::new();
//! seed.insert("report_id".to_string(), json!(7));
//!
//! tracker
//!     .start(seed, async {
//!         batch::add_callback("ReportMailer");
//!         assert_eq!(batch::get(&["report_id"]), Some(json!(7)));
//!         Ok::<_, BatchError>(())
//!     })
//!     .await
//! # }
//! ```

pub mod id;
pub mod tracker;

pub use id::generate_batch_id;
pub use tracker::{BatchTracker, BatchTrackerBuilder};

use crate::context::{self, BatchInfo, Datastore};
use serde_json::{Map, Value};

/// Whether code on this context is running inside a batch
pub fn is_active() -> bool {
    context::depth() > 0 && info().is_some()
}

/// Metadata of the active batch
pub fn info() -> Option<BatchInfo> {
    if context::depth() == 0 {
        return None;
    }
    context::with_datastore(Datastore::batch_info).flatten()
}

/// Snapshot of the active batch's datastore
pub fn datastore() -> Option<Datastore> {
    if !is_active() {
        return None;
    }
    context::current()
}

/// Append a callback name to the active batch; `false` outside a batch
pub fn add_callback(name: &str) -> bool {
    if !is_active() {
        return false;
    }
    context::with_datastore_mut(|ds| ds.add_callback(name)).unwrap_or(false)
}

/// Value at the nested key path
pub fn get(keys: &[&str]) -> Option<Value> {
    if !is_active() {
        return None;
    }
    context::with_datastore(|ds| ds.dig(keys).cloned()).flatten()
}

/// Store `value` at the nested key path
///
/// Every key but the last must already address an object.
pub fn set(keys: &[&str], value: Value) -> bool {
    if !is_active() {
        return false;
    }
    context::with_datastore_mut(|ds| ds.set_path(keys, value)).unwrap_or(false)
}

/// Shallow-merge `values` into the datastore
pub fn merge(values: Map<String, Value>) -> bool {
    if !is_active() {
        return false;
    }
    context::with_datastore_mut(|ds| ds.merge(values)).is_some()
}
