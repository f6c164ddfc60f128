//! Flush throughput benchmark for [`sstable_store`].
//!
//! Every shard owns a [`env::BenchEnv`] with a private memtable and output
//! directory. The [`coordinator`] runs the configured number of iterations;
//! in each one it flushes the first `parallelism` shards concurrently and sums
//! their partitions/sec into one sample. The [`stats`] module turns the samples
//! into `mean +- standard error`.
//!
//! How shards are scheduled is up to the [`engines`]:
//! tasks on one multi-threaded runtime, or one OS thread per shard.

pub mod config;
pub mod coordinator;
pub mod engines;
pub mod env;
pub mod keygen;
pub mod output;
pub mod stats;
