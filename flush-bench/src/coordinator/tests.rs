use std::{
    sync::{atomic::AtomicBool, Mutex},
    time::Duration,
};

use futures::{future::BoxFuture, FutureExt};
use sstable_store::DirectoryError;

use super::*;
use crate::env::FlushSample;

#[derive(Clone, Copy, PartialEq)]
enum Fault {
    Directory,
    Gone,
    Panic,
}

/// Shard `s` reports `1000 * (s + 1) + 10 * iteration` partitions flushed in one second.
struct MockPool {
    shards: usize,
    calls: Mutex<Vec<(usize, u64)>>,
    fault: Option<(usize, u64, Fault)>,
}

impl MockPool {
    fn new(shards: usize) -> Self {
        MockPool {
            shards,
            calls: Mutex::new(Vec::new()),
            fault: None,
        }
    }

    fn failing(shards: usize, shard: usize, iteration: u64, fault: Fault) -> Self {
        MockPool {
            fault: Some((shard, iteration, fault)),
            ..Self::new(shards)
        }
    }

    fn calls(&self) -> Vec<(usize, u64)> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort();
        calls
    }
}

impl ShardPool for MockPool {
    fn shard_count(&self) -> usize {
        self.shards
    }

    fn flush(
        &self,
        shard: usize,
        iteration: u64,
    ) -> BoxFuture<'static, Result<FlushSample, ShardError>> {
        self.calls.lock().unwrap().push((shard, iteration));
        let fault = match self.fault {
            Some((s, i, fault)) if s == shard && i == iteration => Some(fault),
            _ => None,
        };
        async move {
            tokio::task::yield_now().await;
            match fault {
                None => Ok(FlushSample {
                    partitions: 1000 * (shard + 1) + 10 * iteration as usize,
                    elapsed: Duration::from_secs(1),
                }),
                Some(Fault::Directory) => Err(ShardError::Flush(FlushError::Directory(
                    DirectoryError {
                        path: "/denied/1".into(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::PermissionDenied,
                            "denied",
                        ),
                    },
                ))),
                Some(Fault::Gone) => Err(ShardError::Gone),
                Some(Fault::Panic) => panic!("shard {shard} blew up"),
            }
        }
        .boxed()
    }
}

fn plan(iterations: usize, parallelism: usize, shards: usize) -> RunPlan {
    RunPlan {
        iterations,
        parallelism,
        shards,
    }
}

#[tokio::test]
async fn flushes_first_shards_and_sums() {
    let pool = MockPool::new(4);
    let stop = AtomicBool::new(false);
    let summary = run(&plan(3, 2, 4), &pool, &stop).await.unwrap();

    assert_eq!(
        pool.calls(),
        vec![(0, 0), (0, 1), (0, 2), (1, 0), (1, 1), (1, 2)]
    );
    assert_eq!(summary.aggregates, vec![3000.0, 3020.0, 3040.0]);
    assert_eq!(summary.stats.count(), 3);
    assert_eq!(summary.flush_latencies.len(), 6);

    let report = summary.report().unwrap();
    assert!((report.mean - 3020.0).abs() < 1e-9);
    assert_eq!(
        report.to_string(),
        "3020.00 +- 11.55 partitions / sec (3 runs, 2 concurrent ops)"
    );
}

#[tokio::test]
async fn single_shard_single_iteration() {
    let pool = MockPool::new(1);
    let stop = AtomicBool::new(false);
    let summary = run(&plan(1, 1, 1), &pool, &stop).await.unwrap();
    assert_eq!(summary.aggregates, vec![1000.0]);
    assert_eq!(
        summary.report().unwrap().to_string(),
        "1000.00 +- 0.00 partitions / sec (1 runs, 1 concurrent ops)"
    );
}

#[tokio::test]
async fn flush_failure_aborts_run() {
    let pool = MockPool::failing(2, 1, 1, Fault::Directory);
    let stop = AtomicBool::new(false);
    let err = run(&plan(5, 2, 2), &pool, &stop).await.err().unwrap();
    match err {
        RunError::Flush {
            shard: 1,
            iteration: 1,
            source: FlushError::Directory(_),
        } => {}
        e => panic!("unexpected error: {e:?}"),
    }
    // nothing from later iterations was started
    assert!(pool.calls().iter().all(|(_, iteration)| *iteration <= 1));
}

#[tokio::test]
async fn lost_shard_aborts_run() {
    let pool = MockPool::failing(2, 0, 0, Fault::Gone);
    let stop = AtomicBool::new(false);
    let err = run(&plan(2, 2, 2), &pool, &stop).await.err().unwrap();
    assert!(matches!(err, RunError::ShardLost { shard: 0 }), "{err:?}");
}

#[tokio::test]
async fn panicking_shard_aborts_run() {
    let pool = MockPool::failing(3, 2, 0, Fault::Panic);
    let stop = AtomicBool::new(false);
    let err = run(&plan(2, 3, 3), &pool, &stop).await.err().unwrap();
    assert!(matches!(err, RunError::ShardLost { shard: 2 }), "{err:?}");
}

#[tokio::test]
async fn stop_flag_prevents_iterations() {
    let pool = MockPool::new(2);
    let stop = AtomicBool::new(true);
    let err = run(&plan(3, 1, 2), &pool, &stop).await.err().unwrap();
    assert!(matches!(
        err,
        RunError::Interrupted {
            completed_iterations: 0
        }
    ));
    assert!(pool.calls().is_empty());
}

#[tokio::test]
async fn pool_smaller_than_parallelism() {
    let pool = MockPool::new(1);
    let stop = AtomicBool::new(false);
    let err = run(&plan(1, 2, 4), &pool, &stop).await.err().unwrap();
    assert!(matches!(
        err,
        RunError::Config(ConfigError::ParallelismOutOfRange {
            parallelism: 2,
            shards: 1
        })
    ));
    assert!(pool.calls().is_empty());
}
