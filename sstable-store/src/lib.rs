//! A deliberately small sorted-table storage engine.
//!
//! The crate exposes just enough of a storage engine to drive a flush path:
//!
//! 1. Get the table [`Schema`] (see [`Schema::uncompressed`]).
//! 2. Build a [`Memtable`] for it and [`Memtable::apply`] [`Mutation`]s.
//! 3. Make sure the target directory exists with [`ensure_directory`].
//! 4. Describe the output with [`SstableOptions`] and call
//!    [`Sstable::write_components`] to materialize the memtable on disk.
//!
//! The on-disk encoding is minimal: a data file with the partition keys in
//! sort order, an index file mapping each key to its data offset and a
//! table-of-contents file listing the components.
//!
//! ```rust
//! # async fn doc() -> Result<(), Box<dyn std::error::Error>> {
//! use sstable_store::{ensure_directory, Memtable, Mutation, Schema, Sstable, SstableOptions};
//!
//! let schema = Schema::uncompressed();
//! let mut memtable = Memtable::new(schema.clone());
//! memtable.apply(Mutation::new(&schema, b"some-key".to_vec())?);
//!
//! let dir = std::env::temp_dir().join("sstable-store-doc");
//! ensure_directory(&dir).await?;
//! let info = Sstable::new(SstableOptions::new(&schema, dir, 1))
//!     .write_components(&memtable)
//!     .await?;
//! assert_eq!(info.partitions, 1);
//! # Ok(())
//! # }
//! ```

pub mod dir;
pub mod memtable;
pub mod metrics;
pub mod schema;
pub mod sstable;

pub use dir::{ensure_directory, DirectoryError};
pub use memtable::{Memtable, Mutation, Partition, PartitionKey};
pub use schema::{Schema, SchemaError};
pub use sstable::{
    Component, FormatType, Sstable, SstableInfo, SstableOptions, VersionType, WriteError,
};
