use std::{
    error::Error,
    num::NonZeroUsize,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use clap::Parser;
use flush_bench::{
    config::{
        BenchmarkConfig, BufferPolicy, ByteSize, RunPlan, DEFAULT_ITERATIONS, DEFAULT_KEY_SIZE,
        DEFAULT_PARTITIONS,
    },
    coordinator::{RunError, RunSummary},
    engines::{setup_engine, EngineKind},
    output::{BenchmarkOutput, FlushLatencySummary},
};
use itertools::Itertools;
use serde_with::serde_as;
use sstable_store::VersionType;
use tracing::{error, info};

#[serde_as]
#[derive(serde::Serialize, clap::Parser, Clone)]
#[command(about = "Measure how fast memtables flush to sstables")]
struct Args {
    /// Timed iterations.
    #[clap(long, default_value_t = DEFAULT_ITERATIONS)]
    iterations: usize,
    /// Shards flushed concurrently in each iteration.
    #[clap(long, default_value_t = 1)]
    parallelism: usize,
    /// Shards to create. Defaults to the available CPU parallelism.
    #[clap(long)]
    shards: Option<NonZeroUsize>,
    /// Partitions generated per shard.
    #[clap(long, default_value_t = DEFAULT_PARTITIONS)]
    partitions: usize,
    /// Partition key size in bytes.
    #[clap(long, default_value_t = DEFAULT_KEY_SIZE)]
    key_size: usize,
    /// Write buffer in front of each sstable component, e.g. `64k`.
    #[clap(long, default_value = "64k")]
    buffer_size: ByteSize,
    /// Shard `i` writes its sstables to `<testdir>/<i>/`.
    #[clap(long, default_value = "/var/lib/flush-bench/perf-tests")]
    testdir: PathBuf,
    #[clap(long)]
    seed: Option<u64>,
    #[clap(long, value_enum, default_value = "retain")]
    buffer_policy: BufferPolicy,
    #[clap(long, default_value = "ka")]
    #[serde_as(as = "serde_with::DisplayFromStr")]
    sstable_version: VersionType,
    /// Also write a JSON summary here.
    #[clap(long)]
    output: Option<PathBuf>,
    #[clap(subcommand)]
    engine: EngineKind,
}

impl Args {
    fn benchmark_config(&self) -> BenchmarkConfig {
        BenchmarkConfig {
            partitions: self.partitions,
            key_size: self.key_size,
            buffer_size: self.buffer_size.0,
            base_directory: self.testdir.clone(),
            seed: self.seed,
            buffer_policy: self.buffer_policy,
            sstable_version: self.sstable_version,
        }
    }

    fn run_plan(&self) -> RunPlan {
        let shards = match self.shards {
            Some(shards) => shards.get(),
            None => std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1),
        };
        RunPlan {
            iterations: self.iterations,
            parallelism: self.parallelism,
            shards,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let stop = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let stop = Arc::clone(&stop);
        move || {
            info!("ctrl-c, setting stop flag");
            if stop.fetch_or(true, Ordering::Relaxed) {
                error!("stop flag was already set, aborting");
                std::process::abort();
            } else {
                info!("first ctrl-c, stopping after the current iteration");
            }
        }
    })
    .expect("install ctrl-c handler");

    match run(&args, stop) {
        Ok(summary) => {
            if let Some(report) = summary.report() {
                println!("{report}");
            }
        }
        Err(e) => {
            error!("benchmark failed: {}", error_chain(&e));
            std::process::exit(1);
        }
    }
}

fn run(args: &Args, stop: Arc<AtomicBool>) -> Result<RunSummary, RunError> {
    let config = args.benchmark_config();
    let plan = args.run_plan();
    config.validate()?;
    plan.validate()?;
    info!(
        iterations = plan.iterations,
        parallelism = plan.parallelism,
        shards = plan.shards,
        partitions = config.partitions,
        key_size = config.key_size,
        testdir = %config.base_directory.display(),
        "starting"
    );

    let engine = setup_engine(&args.engine).map_err(RunError::Setup)?;
    let summary = engine.run(config, plan, stop)?;

    info!(
        "{} elapsed={}",
        FlushLatencySummary::from_histogram(&summary.flush_latencies),
        humantime::format_duration(summary.elapsed)
    );
    let store_metrics = sstable_store::metrics::global();
    info!(
        sstables_written = store_metrics.sstables_written,
        bytes_written = store_metrics.bytes_written,
        "storage totals"
    );
    if let Some(outpath) = &args.output {
        info!("writing results to {:?}", outpath);
        if let Err(e) = BenchmarkOutput::new(args, &summary).write_to(outpath) {
            error!("failed to write {:?}: {e}", outpath);
        }
    }
    Ok(summary)
}

fn error_chain(e: &(dyn Error + 'static)) -> String {
    std::iter::successors(Some(e), |&e| e.source())
        .map(|e| e.to_string())
        .join(": ")
}
