//! Basic smoke tests and configuration wiring.
//!
//! These tests always compile and run regardless of feature flags.
//! They validate basic functionality without external dependencies.

mod common;

use batch_tracker::{batch, BatchError, BatchTracker, ConfigManager, JobPlatform, JobQueue};
use common::*;
use serde_json::json;
use std::io::Write;

fn config_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_tracker_from_memory_config() {
    let file = config_file(
        r#"
        ignore_list = ["HeartbeatJob"]
        job_platform = "sidekiq"

        [store]
        backend = "memory"
        namespace = "imports"
        member_ttl_seconds = 3600
        "#,
    );

    let manager = ConfigManager::load_from_path(Some(file.path().to_path_buf()), "test").unwrap();
    let tracker = BatchTracker::from_config(&manager).await;

    assert_eq!(tracker.store().provider_name(), "memory");
    assert_eq!(tracker.store().key("abc"), "imports:batch:abc");
    assert_eq!(tracker.config().job_platform, JobPlatform::Sidekiq);
    assert_eq!(tracker.in_memory_queue("imports").platform(), JobPlatform::Sidekiq);
    assert!(tracker.is_ignored("HeartbeatJob"));
    assert!(!tracker.is_ignored("ImportJob"));
    assert!(tracker.store().health_check().await.unwrap());
}

#[tokio::test]
async fn test_tracker_without_registered_callbacks_still_completes() {
    let tracker = BatchTracker::builder().build();

    let id = tracker
        .start(seed(json!({"x": 1})), async {
            assert!(batch::add_callback("NotRegisteredAnywhere"));
            Ok::<_, BatchError>(batch::info().unwrap().id)
        })
        .await
        .unwrap();

    assert_eq!(tracker.store().member_count(&id).await.unwrap(), 0);
    assert!(!batch::is_active());
}

#[tokio::test]
async fn test_batch_accessors_inside_session() {
    let h = Harness::new();

    h.tracker
        .start(seed(json!({"report": {"rows": 0}})), async {
            assert!(batch::is_active());
            assert!(batch::set(&["report", "rows"], json!(12)));
            assert!(!batch::set(&["missing", "rows"], json!(1)));
            assert!(batch::merge(seed(json!({"status": "running"}))));
            assert_eq!(batch::get(&["report", "rows"]), Some(json!(12)));
            assert_eq!(batch::get(&["status"]), Some(json!("running")));

            let info = batch::info().unwrap();
            assert_eq!(info.id.len(), 22);
            assert_eq!(info.caller.type_name, "");
            Ok::<_, BatchError>(())
        })
        .await
        .unwrap();

    assert_eq!(batch::get(&["status"]), None);
}

#[test]
fn test_logging_macros_resolve_from_outside_the_crate() {
    batch_tracker::log_batch!(info, "STARTED", batch_id: "b1",);
    batch_tracker::log_batch!(debug, "IDLE");
    batch_tracker::log_member!(debug, "ADDED", batch_id: "b1", token: "t1",);
    batch_tracker::log_config!(info, "LOADED", source: "basic_tests");
}
