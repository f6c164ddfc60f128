//! Drives the iterations and reduces per-shard results.

use std::{
    panic::AssertUnwindSafe,
    sync::atomic::{AtomicBool, Ordering},
    time::{Duration, Instant},
};

use futures::FutureExt;
use tokio::task::JoinSet;
use tracing::{debug, info};

use crate::{
    config::{ConfigError, RunPlan},
    engines::{ShardError, ShardPool},
    env::FlushError,
    stats::{MeanAccumulator, Report},
};

#[cfg(test)]
mod tests;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("engine setup failed")]
    Setup(#[source] std::io::Error),
    #[error("flush on shard {shard} failed in iteration {iteration}")]
    Flush {
        shard: usize,
        iteration: u64,
        #[source]
        source: FlushError,
    },
    #[error("shard {shard} went away")]
    ShardLost { shard: usize },
    #[error("flush task was cancelled")]
    Cancelled,
    #[error("interrupted after {completed_iterations} iterations")]
    Interrupted { completed_iterations: usize },
}

/// Everything a completed run produced.
pub struct RunSummary {
    pub plan: RunPlan,
    /// One entry per iteration: sum of the participating shards' partitions/sec.
    pub aggregates: Vec<f64>,
    pub stats: MeanAccumulator,
    /// Duration of every individual shard flush, in nanoseconds.
    pub flush_latencies: hdrhistogram::Histogram<u64>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn report(&self) -> Option<Report> {
        Report::new(&self.stats, self.plan.parallelism)
    }
}

pub fn make_latency_histogram() -> hdrhistogram::Histogram<u64> {
    // 1ns to 1h
    hdrhistogram::Histogram::new_with_bounds(1, 3_600_000_000_000, 3)
        .expect("histogram bounds are valid")
}

/// Run `plan.iterations` iterations one after another. Each flushes shards
/// `0..plan.parallelism` of `pool` concurrently and records the sum of their
/// throughputs.
///
/// The first failing flush ends the run: flushes still in flight are aborted
/// and no summary is produced. `stop` is checked before every iteration.
///
/// Must be called from within a tokio runtime.
pub async fn run<P>(plan: &RunPlan, pool: &P, stop: &AtomicBool) -> Result<RunSummary, RunError>
where
    P: ShardPool + ?Sized,
{
    plan.validate()?;
    if pool.shard_count() < plan.parallelism {
        return Err(ConfigError::ParallelismOutOfRange {
            parallelism: plan.parallelism,
            shards: pool.shard_count(),
        }
        .into());
    }

    let run_start = Instant::now();
    let mut stats = MeanAccumulator::default();
    let mut aggregates = Vec::with_capacity(plan.iterations);
    let mut flush_latencies = make_latency_histogram();

    for iteration in 0..plan.iterations {
        if stop.load(Ordering::Relaxed) {
            info!(iteration, "stop flag set, abandoning run");
            return Err(RunError::Interrupted {
                completed_iterations: iteration,
            });
        }
        let iteration_start = Instant::now();
        let iteration_u64 = iteration as u64;

        let mut flushes = JoinSet::new();
        for shard in 0..plan.parallelism {
            let flush = AssertUnwindSafe(pool.flush(shard, iteration_u64)).catch_unwind();
            flushes.spawn(async move { (shard, flush.await) });
        }

        // Dropping `flushes` on early return aborts the remaining tasks.
        let mut aggregate = 0.0;
        while let Some(joined) = flushes.join_next().await {
            let Ok((shard, res)) = joined else {
                return Err(RunError::Cancelled);
            };
            let sample = match res {
                Ok(Ok(sample)) => sample,
                Ok(Err(ShardError::Flush(source))) => {
                    return Err(RunError::Flush {
                        shard,
                        iteration: iteration_u64,
                        source,
                    })
                }
                Ok(Err(ShardError::Gone)) | Err(_) => {
                    return Err(RunError::ShardLost { shard });
                }
            };
            debug!(
                iteration,
                shard,
                partitions = sample.partitions,
                throughput = sample.throughput(),
                "shard flushed"
            );
            flush_latencies.saturating_record(
                u64::try_from(sample.elapsed.as_nanos()).unwrap_or(u64::MAX),
            );
            aggregate += sample.throughput();
        }

        stats.push(aggregate);
        aggregates.push(aggregate);
        info!(
            iteration,
            aggregate,
            elapsed = %humantime::format_duration(iteration_start.elapsed()),
            "iteration done"
        );
    }

    Ok(RunSummary {
        plan: *plan,
        aggregates,
        stats,
        flush_latencies,
        elapsed: run_start.elapsed(),
    })
}
