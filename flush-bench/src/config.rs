use std::{fmt, path::PathBuf, str::FromStr};

use sstable_store::{schema::MAX_PARTITION_KEY_SIZE, VersionType};

pub const DEFAULT_PARTITIONS: usize = 5000;
pub const DEFAULT_KEY_SIZE: usize = 128;
pub const DEFAULT_BUFFER_SIZE: usize = 64 << 10;
pub const DEFAULT_ITERATIONS: usize = 30;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("partitions must be greater than zero")]
    ZeroPartitions,
    #[error("key size must be greater than zero")]
    ZeroKeySize,
    #[error("key size {key_size} exceeds the maximum partition key size {}", MAX_PARTITION_KEY_SIZE)]
    KeySizeTooLarge { key_size: usize },
    #[error("buffer size must be greater than zero")]
    ZeroBufferSize,
    #[error("iterations must be greater than zero")]
    ZeroIterations,
    #[error("need at least one shard")]
    ZeroShards,
    #[error("parallelism {parallelism} must be between 1 and the number of shards ({shards})")]
    ParallelismOutOfRange { parallelism: usize, shards: usize },
}

/// What to do with a shard's memtable between iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BufferPolicy {
    /// Populate once at shard start; every iteration flushes the same memtable.
    Retain,
    /// Clear and repopulate before every flush, outside the timed section.
    Reset,
}

/// Per-shard benchmark parameters. Cloned into every shard.
#[derive(Debug, Clone)]
pub struct BenchmarkConfig {
    pub partitions: usize,
    pub key_size: usize,
    pub buffer_size: usize,
    /// Shard `i` writes below `base_directory/i`.
    pub base_directory: PathBuf,
    /// Shard `i` seeds its key generator with `seed + i`; entropy if unset.
    pub seed: Option<u64>,
    pub buffer_policy: BufferPolicy,
    pub sstable_version: VersionType,
}

impl BenchmarkConfig {
    pub fn new(base_directory: impl Into<PathBuf>) -> Self {
        BenchmarkConfig {
            partitions: DEFAULT_PARTITIONS,
            key_size: DEFAULT_KEY_SIZE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            base_directory: base_directory.into(),
            seed: None,
            buffer_policy: BufferPolicy::Retain,
            sstable_version: VersionType::Ka,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.partitions == 0 {
            return Err(ConfigError::ZeroPartitions);
        }
        if self.key_size == 0 {
            return Err(ConfigError::ZeroKeySize);
        }
        if self.key_size > MAX_PARTITION_KEY_SIZE {
            return Err(ConfigError::KeySizeTooLarge {
                key_size: self.key_size,
            });
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::ZeroBufferSize);
        }
        Ok(())
    }
}

/// Shape of a run: how many iterations, over how many shards, how many at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct RunPlan {
    pub iterations: usize,
    pub parallelism: usize,
    pub shards: usize,
}

impl RunPlan {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::ZeroIterations);
        }
        if self.shards == 0 {
            return Err(ConfigError::ZeroShards);
        }
        if self.parallelism == 0 || self.parallelism > self.shards {
            return Err(ConfigError::ParallelismOutOfRange {
                parallelism: self.parallelism,
                shards: self.shards,
            });
        }
        Ok(())
    }
}

/// A byte count that parses from `4096`, `64k`, `1m` or `2g` (binary multiples).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct ByteSize(pub usize);

impl FromStr for ByteSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let (stripped, multiplier) = if let Some(stripped) = lower.strip_suffix('k') {
            (stripped, 1 << 10)
        } else if let Some(stripped) = lower.strip_suffix('m') {
            (stripped, 1 << 20)
        } else if let Some(stripped) = lower.strip_suffix('g') {
            (stripped, 1 << 30)
        } else {
            (lower.as_str(), 1)
        };
        match stripped.parse::<usize>() {
            Ok(n) => n
                .checked_mul(multiplier)
                .map(ByteSize)
                .ok_or_else(|| format!("byte size overflows: {s:?}")),
            Err(e) => Err(format!("invalid byte size: {e}: {s:?}")),
        }
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        BenchmarkConfig::new("/tmp/x").validate().unwrap();
    }

    #[test]
    fn rejects_zero_sizes() {
        let mut cfg = BenchmarkConfig::new("/tmp/x");
        cfg.partitions = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroPartitions));

        let mut cfg = BenchmarkConfig::new("/tmp/x");
        cfg.key_size = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroKeySize));

        let mut cfg = BenchmarkConfig::new("/tmp/x");
        cfg.key_size = MAX_PARTITION_KEY_SIZE + 1;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::KeySizeTooLarge { .. })
        ));

        let mut cfg = BenchmarkConfig::new("/tmp/x");
        cfg.buffer_size = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroBufferSize));
    }

    #[test]
    fn run_plan_bounds() {
        let ok = RunPlan {
            iterations: 3,
            parallelism: 2,
            shards: 2,
        };
        ok.validate().unwrap();
        assert_eq!(
            RunPlan { iterations: 0, ..ok }.validate(),
            Err(ConfigError::ZeroIterations)
        );
        assert_eq!(
            RunPlan { shards: 0, ..ok }.validate(),
            Err(ConfigError::ZeroShards)
        );
        assert_eq!(
            RunPlan {
                parallelism: 3,
                ..ok
            }
            .validate(),
            Err(ConfigError::ParallelismOutOfRange {
                parallelism: 3,
                shards: 2
            })
        );
        assert!(RunPlan {
            parallelism: 0,
            ..ok
        }
        .validate()
        .is_err());
    }

    #[test]
    fn byte_size_suffixes() {
        assert_eq!("4096".parse::<ByteSize>().unwrap(), ByteSize(4096));
        assert_eq!("64k".parse::<ByteSize>().unwrap(), ByteSize(64 << 10));
        assert_eq!("1M".parse::<ByteSize>().unwrap(), ByteSize(1 << 20));
        assert_eq!("2g".parse::<ByteSize>().unwrap(), ByteSize(2 << 30));
        assert!("k".parse::<ByteSize>().is_err());
        assert!("12q".parse::<ByteSize>().is_err());
    }
}
