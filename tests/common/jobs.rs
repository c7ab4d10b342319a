//! Job classes used across integration tests

use async_trait::async_trait;
use batch_tracker::jobs::{Job, JobContext};
use batch_tracker::{batch, BatchError};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Does nothing
#[derive(Debug, Default)]
pub struct NoopJob;

#[async_trait]
impl Job for NoopJob {
    async fn perform(&self, _ctx: &JobContext, _args: Vec<Value>) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Dispatches `args[0]` NoopJobs onto its own queue
#[derive(Debug, Default)]
pub struct FanOutJob;

#[async_trait]
impl Job for FanOutJob {
    async fn perform(&self, ctx: &JobContext, args: Vec<Value>) -> anyhow::Result<()> {
        let children = args.first().and_then(Value::as_u64).unwrap_or(1);
        for child in 0..children {
            ctx.dispatch("NoopJob", vec![json!(child)]).await?;
        }
        Ok(())
    }
}

/// What a job observed while running
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub args: Vec<Value>,
    pub active: bool,
    pub x: Option<Value>,
    pub set_accepted: bool,
}

/// Records the arguments and batch state it runs with
#[derive(Debug, Clone, Default)]
pub struct ObserveJob {
    seen: Arc<Mutex<Vec<Observation>>>,
}

impl ObserveJob {
    pub fn observations(&self) -> Vec<Observation> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl Job for ObserveJob {
    async fn perform(&self, _ctx: &JobContext, args: Vec<Value>) -> anyhow::Result<()> {
        let observation = Observation {
            args,
            active: batch::is_active(),
            x: batch::get(&["x"]),
            set_accepted: batch::set(&["observed"], json!(true)),
        };
        self.seen.lock().push(observation);
        Ok(())
    }
}

/// Fails with a business error
#[derive(Debug, Default)]
pub struct FailingJob;

#[async_trait]
impl Job for FailingJob {
    async fn perform(&self, _ctx: &JobContext, _args: Vec<Value>) -> anyhow::Result<()> {
        anyhow::bail!("invoice total mismatch")
    }
}

/// Panics
#[derive(Debug, Default)]
pub struct PanickingJob;

#[async_trait]
impl Job for PanickingJob {
    async fn perform(&self, _ctx: &JobContext, _args: Vec<Value>) -> anyhow::Result<()> {
        panic!("worker crashed mid-job")
    }
}

/// Starts a batch from inside a job and re-enqueues its own class in it
#[derive(Debug, Default)]
pub struct ReportJob;

#[async_trait]
impl Job for ReportJob {
    async fn perform(&self, ctx: &JobContext, args: Vec<Value>) -> anyhow::Result<()> {
        if !args.is_empty() {
            return Ok(());
        }
        ctx.start_batch(Map::new(), async {
            batch::add_callback("Recorder");
            ctx.dispatch("ReportJob", vec![json!("page-2")]).await?;
            ctx.dispatch("NoopJob", vec![]).await?;
            Ok::<_, BatchError>(())
        })
        .await?;
        Ok(())
    }
}
