use std::{
    num::NonZeroUsize,
    sync::{atomic::AtomicBool, Arc},
};

use futures::{future, future::BoxFuture, FutureExt};
use tracing::info;

use super::{Engine, ShardError, ShardPool};
use crate::{
    config::{BenchmarkConfig, ConfigError, RunPlan},
    coordinator::{self, RunError, RunSummary},
    env::{BenchEnv, FlushSample},
};

pub(crate) struct EngineTokioTasks {
    rt: tokio::runtime::Runtime,
}

impl EngineTokioTasks {
    pub(crate) fn new(worker_threads: Option<NonZeroUsize>) -> std::io::Result<Self> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        if let Some(worker_threads) = worker_threads {
            builder.worker_threads(worker_threads.get());
        }
        let rt = builder.enable_all().build()?;
        Ok(Self { rt })
    }
}

impl Engine for EngineTokioTasks {
    fn run(
        self: Box<Self>,
        config: BenchmarkConfig,
        plan: RunPlan,
        stop: Arc<AtomicBool>,
    ) -> Result<RunSummary, RunError> {
        let EngineTokioTasks { rt } = *self;
        rt.block_on(async move {
            plan.validate()?;
            let pool = TaskPool::start(config, plan.shards).await?;
            coordinator::run(&plan, &pool, &stop).await
        })
    }
}

/// Shards living on the current tokio runtime.
///
/// Each environment sits behind its own mutex. The coordinator never has two
/// flushes in flight for one shard, so the lock is only ever taken uncontended;
/// it exists to hand the environment to whichever worker runs the flush.
pub struct TaskPool {
    shards: Vec<Arc<tokio::sync::Mutex<BenchEnv>>>,
}

impl TaskPool {
    /// Build and populate `shards` environments in parallel.
    pub async fn start(config: BenchmarkConfig, shards: usize) -> Result<Self, RunError> {
        config.validate()?;
        let mut handles = Vec::with_capacity(shards);
        for shard in 0..shards {
            let config = config.clone();
            handles.push(tokio::task::spawn_blocking(
                move || -> Result<BenchEnv, ConfigError> {
                    let mut env = BenchEnv::new(shard, config)?;
                    env.populate();
                    Ok(env)
                },
            ));
        }
        let mut envs = Vec::with_capacity(shards);
        for (shard, handle) in handles.into_iter().enumerate() {
            let env = handle.await.map_err(|_| RunError::ShardLost { shard })??;
            envs.push(Arc::new(tokio::sync::Mutex::new(env)));
        }
        info!(shards, "shards populated");
        Ok(TaskPool { shards: envs })
    }
}

impl ShardPool for TaskPool {
    fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn flush(
        &self,
        shard: usize,
        iteration: u64,
    ) -> BoxFuture<'static, Result<FlushSample, ShardError>> {
        let Some(env) = self.shards.get(shard).cloned() else {
            return future::ready(Err(ShardError::Gone)).boxed();
        };
        async move {
            let mut env = env.lock_owned().await;
            Ok(env.run_iteration(iteration).await?)
        }
        .boxed()
    }
}
