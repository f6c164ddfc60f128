//! Sstable descriptors and the component writer.

use std::{fmt, path::PathBuf, str::FromStr};

use crate::schema::Schema;

mod writer;


pub use writer::WriteError;

pub const DEFAULT_BUFFER_SIZE: usize = 64 << 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionType {
    Ka,
    La,
    Mc,
}

impl fmt::Display for VersionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            VersionType::Ka => "ka",
            VersionType::La => "la",
            VersionType::Mc => "mc",
        })
    }
}

impl FromStr for VersionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ka" => Ok(VersionType::Ka),
            "la" => Ok(VersionType::La),
            "mc" => Ok(VersionType::Mc),
            x => Err(format!("unknown sstable version: {x:?}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatType {
    Big,
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatType::Big => f.write_str("big"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Data,
    Index,
    Toc,
}

impl Component {
    pub fn file_name(&self) -> &'static str {
        match self {
            Component::Data => "Data.db",
            Component::Index => "Index.db",
            Component::Toc => "TOC.txt",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Where and how to write one sstable.
#[derive(Debug, Clone)]
pub struct SstableOptions {
    pub keyspace: String,
    pub table: String,
    pub dir: PathBuf,
    pub generation: u64,
    pub version: VersionType,
    pub format: FormatType,
    /// Capacity of the write buffer in front of each component file.
    pub buffer_size: usize,
}

impl SstableOptions {
    pub fn new(schema: &Schema, dir: impl Into<PathBuf>, generation: u64) -> Self {
        SstableOptions {
            keyspace: schema.keyspace.clone(),
            table: schema.table.clone(),
            dir: dir.into(),
            generation,
            version: VersionType::Ka,
            format: FormatType::Big,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }

    pub fn version(mut self, version: VersionType) -> Self {
        self.version = version;
        self
    }

    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }
}

/// A not-yet-written sstable. Consumed by [`Sstable::write_components`].
pub struct Sstable {
    opts: SstableOptions,
}

/// What a successful [`Sstable::write_components`] left on disk.
#[derive(Debug, Clone)]
pub struct SstableInfo {
    pub generation: u64,
    pub partitions: usize,
    pub data_size: u64,
    pub index_size: u64,
    pub components: Vec<PathBuf>,
}

impl SstableInfo {
    pub fn bytes_written(&self) -> u64 {
        self.data_size + self.index_size
    }
}

impl Sstable {
    pub fn new(opts: SstableOptions) -> Self {
        Sstable { opts }
    }

    pub fn options(&self) -> &SstableOptions {
        &self.opts
    }

    pub fn filename(&self, component: Component) -> PathBuf {
        let o = &self.opts;
        let name = match o.version {
            VersionType::Ka => format!(
                "{}-{}-{}-{}-{}",
                o.keyspace, o.table, o.version, o.generation, component
            ),
            VersionType::La | VersionType::Mc => {
                format!("{}-{}-{}-{}", o.version, o.generation, o.format, component)
            }
        };
        o.dir.join(name)
    }
}
