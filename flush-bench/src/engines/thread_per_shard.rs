use std::sync::{atomic::AtomicBool, Arc};

use futures::{future::BoxFuture, FutureExt};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info};

use super::{Engine, ShardError, ShardPool};
use crate::{
    config::{BenchmarkConfig, RunPlan},
    coordinator::{self, RunError, RunSummary},
    env::{BenchEnv, FlushError, FlushSample},
};

pub(crate) struct EngineThreadPerShard {
    // drives the coordinator; shards bring their own
    rt: tokio::runtime::Runtime,
}

impl EngineThreadPerShard {
    pub(crate) fn new() -> std::io::Result<Self> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self { rt })
    }
}

impl Engine for EngineThreadPerShard {
    fn run(
        self: Box<Self>,
        config: BenchmarkConfig,
        plan: RunPlan,
        stop: Arc<AtomicBool>,
    ) -> Result<RunSummary, RunError> {
        let EngineThreadPerShard { rt } = *self;
        plan.validate()?;
        let pool = ShardThreads::start(config, plan.shards)?;
        let res = rt.block_on(coordinator::run(&plan, &pool, &stop));
        pool.shutdown();
        res
    }
}

struct FlushRequest {
    iteration: u64,
    reply: oneshot::Sender<Result<FlushSample, FlushError>>,
}

struct ShardThread {
    requests: mpsc::UnboundedSender<FlushRequest>,
    thread: std::thread::JoinHandle<()>,
}

/// One OS thread per shard, each owning its [`BenchEnv`] outright.
///
/// Flushes are requests on the shard's channel, so a shard works through them
/// strictly in order. Must be started and shut down outside of an async context.
pub struct ShardThreads {
    shards: Vec<ShardThread>,
}

impl ShardThreads {
    /// Spawn the shard threads and wait until each has populated its memtable.
    pub fn start(config: BenchmarkConfig, shards: usize) -> Result<Self, RunError> {
        config.validate()?;
        let mut pool = ShardThreads {
            shards: Vec::with_capacity(shards),
        };
        let mut ready = Vec::with_capacity(shards);
        for shard in 0..shards {
            let (requests_tx, requests_rx) = mpsc::unbounded_channel();
            let (ready_tx, ready_rx) = oneshot::channel();
            let config = config.clone();
            let thread = std::thread::Builder::new()
                .name(format!("shard-{shard}"))
                .spawn(move || shard_main(shard, config, requests_rx, ready_tx))
                .map_err(RunError::Setup)?;
            pool.shards.push(ShardThread {
                requests: requests_tx,
                thread,
            });
            ready.push(ready_rx);
        }
        for (shard, ready_rx) in ready.into_iter().enumerate() {
            match ready_rx.blocking_recv() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => return Err(RunError::ShardLost { shard }),
            }
        }
        info!(shards, "shard threads ready");
        Ok(pool)
    }

    /// Close all request channels and join the threads.
    pub fn shutdown(self) {
        drop(self)
    }
}

impl Drop for ShardThreads {
    fn drop(&mut self) {
        for (shard, ShardThread { requests, thread }) in self.shards.drain(..).enumerate() {
            drop(requests);
            if thread.join().is_err() {
                error!(shard, "shard thread panicked");
            }
        }
    }
}

impl ShardPool for ShardThreads {
    fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn flush(
        &self,
        shard: usize,
        iteration: u64,
    ) -> BoxFuture<'static, Result<FlushSample, ShardError>> {
        let (reply, result) = oneshot::channel();
        let sent = match self.shards.get(shard) {
            Some(s) => s.requests.send(FlushRequest { iteration, reply }).is_ok(),
            None => false,
        };
        async move {
            if !sent {
                return Err(ShardError::Gone);
            }
            match result.await {
                Ok(res) => Ok(res?),
                Err(_) => Err(ShardError::Gone),
            }
        }
        .boxed()
    }
}

fn shard_main(
    shard: usize,
    config: BenchmarkConfig,
    mut requests: mpsc::UnboundedReceiver<FlushRequest>,
    ready: oneshot::Sender<Result<(), RunError>>,
) {
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready.send(Err(RunError::Setup(e)));
            return;
        }
    };
    let mut env = match BenchEnv::new(shard, config) {
        Ok(env) => env,
        Err(e) => {
            let _ = ready.send(Err(e.into()));
            return;
        }
    };
    env.populate();
    if ready.send(Ok(())).is_err() {
        return;
    }

    rt.block_on(async move {
        while let Some(FlushRequest { iteration, reply }) = requests.recv().await {
            let res = env.run_iteration(iteration).await;
            if reply.send(res).is_err() {
                debug!(shard, iteration, "coordinator stopped waiting for flush");
            }
        }
    });
    debug!(shard, "shard thread stopping");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &std::path::Path) -> BenchmarkConfig {
        let mut cfg = BenchmarkConfig::new(base);
        cfg.partitions = 100;
        cfg.key_size = 8;
        cfg
    }

    #[test]
    fn flushes_go_to_their_shard() {
        let tempdir = tempfile::tempdir().unwrap();
        let pool = ShardThreads::start(config(tempdir.path()), 3).unwrap();
        assert_eq!(pool.shard_count(), 3);

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let sample = rt.block_on(pool.flush(2, 5)).unwrap();
        assert_eq!(sample.partitions, 100);
        assert!(tempdir.path().join("2").join("ks-cf-ka-5-Data.db").exists());
        assert!(!tempdir.path().join("0").exists());

        assert!(matches!(
            rt.block_on(pool.flush(3, 0)),
            Err(ShardError::Gone)
        ));
        pool.shutdown();
    }

    #[test]
    fn invalid_config_fails_before_spawning() {
        let mut cfg = config(std::path::Path::new("/unused"));
        cfg.key_size = 0;
        assert!(matches!(
            ShardThreads::start(cfg, 2),
            Err(RunError::Config(_))
        ));
    }
}
