//! Ways of hosting the shards.
//!
//! An [`Engine`] owns the runtime(s), builds the shards and hands a
//! [`ShardPool`] to [`crate::coordinator::run`].

use std::{
    num::NonZeroUsize,
    sync::{atomic::AtomicBool, Arc},
};

use futures::future::BoxFuture;

use crate::{
    config::{BenchmarkConfig, RunPlan},
    coordinator::{RunError, RunSummary},
    env::{FlushError, FlushSample},
};

pub mod thread_per_shard;
pub mod tokio_tasks;

use self::{thread_per_shard::EngineThreadPerShard, tokio_tasks::EngineTokioTasks};

#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    #[error(transparent)]
    Flush(#[from] FlushError),
    #[error("shard is gone")]
    Gone,
}

/// Shards addressable by index `0..shard_count()`.
pub trait ShardPool {
    fn shard_count(&self) -> usize;

    /// Run iteration `iteration` on `shard`.
    ///
    /// Callers must not have two flushes for the same shard in flight.
    fn flush(
        &self,
        shard: usize,
        iteration: u64,
    ) -> BoxFuture<'static, Result<FlushSample, ShardError>>;
}

pub trait Engine {
    fn run(
        self: Box<Self>,
        config: BenchmarkConfig,
        plan: RunPlan,
        stop: Arc<AtomicBool>,
    ) -> Result<RunSummary, RunError>;
}

#[derive(Debug, Clone, Copy, clap::Subcommand, serde::Serialize)]
pub enum EngineKind {
    /// All shards are tasks on one multi-threaded tokio runtime.
    TokioTasks {
        #[clap(long)]
        worker_threads: Option<NonZeroUsize>,
    },
    /// Every shard gets an OS thread with its own current-thread runtime.
    ThreadPerShard,
}

pub fn setup_engine(engine_kind: &EngineKind) -> std::io::Result<Box<dyn Engine>> {
    Ok(match engine_kind {
        EngineKind::TokioTasks { worker_threads } => {
            Box::new(EngineTokioTasks::new(*worker_threads)?)
        }
        EngineKind::ThreadPerShard => Box::new(EngineThreadPerShard::new()?),
    })
}
