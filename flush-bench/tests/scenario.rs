use std::{
    num::NonZeroUsize,
    path::Path,
    sync::{atomic::AtomicBool, Arc},
};

use flush_bench::{
    config::{BenchmarkConfig, ConfigError, RunPlan},
    coordinator::{self, RunError},
    engines::{setup_engine, tokio_tasks::TaskPool, EngineKind},
    env::FlushError,
};

fn config(base: &Path) -> BenchmarkConfig {
    let mut cfg = BenchmarkConfig::new(base);
    cfg.partitions = 1000;
    cfg.key_size = 16;
    cfg
}

const PLAN: RunPlan = RunPlan {
    iterations: 3,
    parallelism: 2,
    shards: 2,
};

fn assert_report_line(line: &str) {
    let (mean, rest) = line.split_once(" +- ").unwrap();
    let (stderr, rest) = rest.split_once(' ').unwrap();
    assert_eq!(rest, "partitions / sec (3 runs, 2 concurrent ops)", "{line}");
    for number in [mean, stderr] {
        let (_, decimals) = number.split_once('.').unwrap();
        assert_eq!(decimals.len(), 2, "{line}");
        assert!(number.parse::<f64>().unwrap() >= 0.0, "{line}");
    }
}

fn assert_sstables_written(base: &Path) {
    for shard in 0..2 {
        for generation in 0..3 {
            let data = base
                .join(shard.to_string())
                .join(format!("ks-cf-ka-{generation}-Data.db"));
            assert!(data.exists(), "{data:?}");
        }
    }
}

fn run_engine(engine: EngineKind) {
    let tempdir = tempfile::tempdir().unwrap();
    let engine = setup_engine(&engine).unwrap();
    let summary = engine
        .run(
            config(tempdir.path()),
            PLAN,
            Arc::new(AtomicBool::new(false)),
        )
        .unwrap();

    assert_eq!(summary.aggregates.len(), 3);
    assert!(summary.aggregates.iter().all(|a| *a > 0.0));
    assert_eq!(summary.flush_latencies.len(), 6);
    let report = summary.report().unwrap();
    let mean = summary.aggregates.iter().sum::<f64>() / 3.0;
    assert!((report.mean - mean).abs() <= 1e-9 * mean);
    assert_report_line(&report.to_string());
    assert_sstables_written(tempdir.path());
}

#[test]
fn scenario_tokio_tasks() {
    run_engine(EngineKind::TokioTasks {
        worker_threads: NonZeroUsize::new(2),
    });
}

#[test]
fn scenario_thread_per_shard() {
    run_engine(EngineKind::ThreadPerShard);
}

#[test]
fn directory_failure_suppresses_report() {
    let tempdir = tempfile::tempdir().unwrap();
    let base = tempdir.path().join("occupied");
    std::fs::write(&base, b"a file where the shard directories should go").unwrap();

    let engine = setup_engine(&EngineKind::TokioTasks {
        worker_threads: None,
    })
    .unwrap();
    let err = engine
        .run(config(&base), PLAN, Arc::new(AtomicBool::new(false)))
        .err()
        .unwrap();
    assert!(
        matches!(
            err,
            RunError::Flush {
                iteration: 0,
                source: FlushError::Directory(_),
                ..
            }
        ),
        "{err:?}"
    );
}

#[test]
fn invalid_config_fails_before_shard_work() {
    let tempdir = tempfile::tempdir().unwrap();
    let mut cfg = config(tempdir.path());
    cfg.partitions = 0;
    let engine = setup_engine(&EngineKind::ThreadPerShard).unwrap();
    let err = engine
        .run(cfg, PLAN, Arc::new(AtomicBool::new(false)))
        .err()
        .unwrap();
    assert!(matches!(err, RunError::Config(ConfigError::ZeroPartitions)));
    assert_eq!(std::fs::read_dir(tempdir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn task_pool_with_coordinator() {
    let tempdir = tempfile::tempdir().unwrap();
    let pool = TaskPool::start(config(tempdir.path()), 2).await.unwrap();
    let summary = coordinator::run(&PLAN, &pool, &AtomicBool::new(false))
        .await
        .unwrap();
    assert_eq!(summary.stats.count(), 3);
    assert_sstables_written(tempdir.path());
}
