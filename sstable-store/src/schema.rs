//! Table schema. Only the bits the flush path looks at are modelled.

use std::sync::Arc;

use once_cell::sync::Lazy;

/// Largest partition key the data file can encode (u16 length prefix).
pub const MAX_PARTITION_KEY_SIZE: usize = u16::MAX as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Bytes,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub name: String,
    pub ty: ColumnType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
}

#[derive(Debug, PartialEq, Eq)]
pub struct Schema {
    pub keyspace: String,
    pub table: String,
    pub partition_key: ColumnDefinition,
    pub compression: Compression,
}

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("empty partition key for column {column:?}")]
    EmptyKey { column: String },
    #[error("partition key of {len} bytes exceeds maximum of {}", MAX_PARTITION_KEY_SIZE)]
    KeyTooLarge { len: usize },
}

static UNCOMPRESSED: Lazy<Arc<Schema>> = Lazy::new(|| {
    Arc::new(Schema {
        keyspace: "ks".to_owned(),
        table: "cf".to_owned(),
        partition_key: ColumnDefinition {
            name: "name".to_owned(),
            ty: ColumnType::Bytes,
        },
        compression: Compression::None,
    })
});

impl Schema {
    /// The single-column, uncompressed table every benchmark shard writes to.
    pub fn uncompressed() -> Arc<Schema> {
        Arc::clone(&UNCOMPRESSED)
    }

    pub(crate) fn validate_key(&self, key: &[u8]) -> Result<(), SchemaError> {
        if key.is_empty() {
            return Err(SchemaError::EmptyKey {
                column: self.partition_key.name.clone(),
            });
        }
        if key.len() > MAX_PARTITION_KEY_SIZE {
            return Err(SchemaError::KeyTooLarge { len: key.len() });
        }
        Ok(())
    }
}
