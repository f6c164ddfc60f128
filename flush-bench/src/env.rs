//! Per-shard benchmark environment.

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use sstable_store::{
    ensure_directory, DirectoryError, Memtable, Mutation, Schema, Sstable, SstableInfo,
    SstableOptions, WriteError,
};
use tracing::debug;

use crate::{
    config::{BenchmarkConfig, BufferPolicy, ConfigError},
    keygen::KeyGenerator,
};

#[derive(Debug, thiserror::Error)]
pub enum FlushError {
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    StorageWrite(#[from] WriteError),
}

/// Outcome of one timed flush on one shard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlushSample {
    /// Memtable partitions at flush start.
    pub partitions: usize,
    pub elapsed: Duration,
}

impl FlushSample {
    /// Partitions per second.
    pub fn throughput(&self) -> f64 {
        self.partitions as f64 / self.elapsed.as_secs_f64()
    }
}

pub struct BenchEnv {
    shard: usize,
    cfg: BenchmarkConfig,
    schema: Arc<Schema>,
    keygen: KeyGenerator,
    memtable: Memtable,
    sstables: Vec<SstableInfo>,
}

impl BenchEnv {
    pub fn new(shard: usize, cfg: BenchmarkConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        let schema = Schema::uncompressed();
        let seed = cfg.seed.map(|seed| seed.wrapping_add(shard as u64));
        Ok(BenchEnv {
            shard,
            keygen: KeyGenerator::new(cfg.key_size, seed),
            memtable: Memtable::new(Arc::clone(&schema)),
            schema,
            cfg,
            sstables: Vec::new(),
        })
    }

    pub fn shard(&self) -> usize {
        self.shard
    }

    /// This shard's private output directory.
    pub fn dir(&self) -> PathBuf {
        self.cfg.base_directory.join(self.shard.to_string())
    }

    pub fn memtable(&self) -> &Memtable {
        &self.memtable
    }

    /// Sstables written by this shard so far, oldest first.
    pub fn sstables(&self) -> &[SstableInfo] {
        &self.sstables
    }

    /// Apply `partitions` freshly generated keys. Adds to what is already there.
    pub fn populate(&mut self) {
        for _ in 0..self.cfg.partitions {
            let key = self.keygen.next_key();
            let m = Mutation::new(&self.schema, key)
                .expect("key size is validated when the env is built");
            self.memtable.apply(m);
        }
        debug!(
            shard = self.shard,
            partitions = self.memtable.partition_count(),
            "memtable populated"
        );
    }

    /// Write the memtable to a new sstable with generation `iteration` and time it.
    #[tracing::instrument(skip(self), level = "trace", fields(shard = self.shard))]
    pub async fn flush(&mut self, iteration: u64) -> Result<FlushSample, FlushError> {
        let start = Instant::now();
        let partitions = self.memtable.partition_count();

        let dir = self.dir();
        ensure_directory(&dir).await?;

        let opts = SstableOptions::new(&self.schema, dir, iteration)
            .version(self.cfg.sstable_version)
            .buffer_size(self.cfg.buffer_size);
        let info = Sstable::new(opts).write_components(&self.memtable).await?;

        let elapsed = start.elapsed();
        self.sstables.push(info);
        Ok(FlushSample {
            partitions,
            elapsed,
        })
    }

    /// Apply the buffer policy, then [`Self::flush`].
    pub async fn run_iteration(&mut self, iteration: u64) -> Result<FlushSample, FlushError> {
        match self.cfg.buffer_policy {
            BufferPolicy::Retain => {}
            BufferPolicy::Reset => {
                if iteration > 0 || self.memtable.is_empty() {
                    self.memtable.clear();
                    self.populate();
                }
            }
        }
        self.flush(iteration).await
    }
}
