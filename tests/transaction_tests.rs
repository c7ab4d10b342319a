//! Callback deferral around relational transactions.

mod common;

use batch_tracker::jobs::Worker;
use batch_tracker::{batch, context, transaction, BatchError, BatchResult};
use common::*;
use serde_json::json;

#[tokio::test]
async fn test_completion_deferred_until_commit() {
    let h = Harness::new();

    context::scope(async {
        let result: BatchResult<()> = transaction::run(async {
            h.tracker
                .start(seed(json!({"x": 1})), async {
                    batch::add_callback("Recorder");
                    Ok::<_, BatchError>(())
                })
                .await?;

            assert!(h.recorder.completes().is_empty());
            assert_eq!(h.memory.live_sets(), 0);
            assert!(!batch::is_active());
            Ok::<_, BatchError>(())
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(h.recorder.completes().len(), 1);
        assert_eq!(h.recorder.completes()[0].get("x"), Some(&json!(1)));
        assert_eq!(context::current(), None);
    })
    .await;
}

#[tokio::test]
async fn test_completion_skipped_on_rollback() {
    let h = Harness::new();

    context::scope(async {
        let result: BatchResult<()> = transaction::run(async {
            h.tracker
                .start(seed(json!({"x": 1})), async {
                    batch::add_callback("Recorder");
                    Ok::<_, BatchError>(())
                })
                .await?;
            Err(BatchError::DatabaseError("deadlock detected".to_string()))
        })
        .await;

        assert!(result.is_err());
        assert!(h.recorder.events().is_empty());
        assert_eq!(context::current(), None);
    })
    .await;
}

#[tokio::test]
async fn test_job_callbacks_follow_worker_transaction() {
    let h = Harness::new();

    h.tracker
        .start(seed(json!({})), async {
            batch::add_callback("Recorder");
            h.tracker.dispatch(&*h.queue, "NoopJob", vec![]).await?;
            Ok::<_, BatchError>(())
        })
        .await
        .unwrap();
    assert!(h.recorder.completes().is_empty());

    let worker = Worker::new(h.tracker.clone(), h.queue.clone());
    context::scope(async {
        let result: BatchResult<()> = transaction::run(async {
            worker.run_once().await.unwrap()?;
            assert!(h.recorder.events().is_empty());
            Ok::<_, BatchError>(())
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(context::current(), None);
    })
    .await;

    assert_eq!(h.recorder.completes().len(), 1);
    assert_eq!(h.recorder.job_completes().len(), 1);
}

#[tokio::test]
async fn test_transaction_inside_batch_block_defers_only_its_own_work() {
    let h = Harness::new();

    h.tracker
        .start(seed(json!({})), async {
            batch::add_callback("Recorder");
            let inner: BatchResult<()> = transaction::run(async {
                assert!(batch::is_active());
                Ok::<_, BatchError>(())
            })
            .await;
            inner?;
            assert!(batch::is_active());
            Ok::<_, BatchError>(())
        })
        .await
        .unwrap();

    assert_eq!(h.recorder.completes().len(), 1);
}

#[tokio::test]
async fn test_unbatched_job_ignores_datastore_awaiting_commit() {
    let h = Harness::new();

    context::scope(async {
        let result: BatchResult<()> = transaction::run(async {
            h.tracker
                .start(seed(json!({"x": 1})), async {
                    batch::add_callback("Recorder");
                    Ok::<_, BatchError>(())
                })
                .await?;

            // the finished batch's datastore is still installed until commit
            h.tracker
                .perform_now("ObserveJob", vec![json!("plain")])
                .await?;
            Ok::<_, BatchError>(())
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(context::current(), None);
    })
    .await;

    let observations = h.observer.observations();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].args, vec![json!("plain")]);
    assert!(!observations[0].active);
    assert_eq!(observations[0].x, None);
    assert!(!observations[0].set_accepted);
    assert!(h.recorder.job_completes().is_empty());
    assert_eq!(h.recorder.completes().len(), 1);
}
