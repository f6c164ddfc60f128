//! In-memory write buffer, ordered by partition key.

use std::{collections::BTreeMap, sync::Arc};

use crate::schema::{Schema, SchemaError};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PartitionKey(Vec<u8>);

impl PartitionKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// A write against a single partition.
///
/// Mutations carry no cells; applying one makes the partition exist.
#[derive(Debug, Clone)]
pub struct Mutation {
    key: PartitionKey,
}

impl Mutation {
    pub fn new(schema: &Schema, key: Vec<u8>) -> Result<Self, SchemaError> {
        schema.validate_key(&key)?;
        Ok(Mutation {
            key: PartitionKey(key),
        })
    }

    pub fn key(&self) -> &PartitionKey {
        &self.key
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Number of mutations merged into this partition.
    pub applied: u64,
}

pub struct Memtable {
    schema: Arc<Schema>,
    partitions: BTreeMap<PartitionKey, Partition>,
}

impl Memtable {
    pub fn new(schema: Arc<Schema>) -> Self {
        Memtable {
            schema,
            partitions: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Merge `m` into the memtable. Mutations for an existing key are merged
    /// into that partition instead of adding a new one.
    pub fn apply(&mut self, m: Mutation) {
        let Mutation { key } = m;
        self.partitions.entry(key).or_default().applied += 1;
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    pub fn clear(&mut self) {
        self.partitions.clear();
    }

    /// Partitions in key order.
    pub fn partitions(&self) -> impl Iterator<Item = (&PartitionKey, &Partition)> {
        self.partitions.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mutation(key: &[u8]) -> Mutation {
        Mutation::new(&Schema::uncompressed(), key.to_vec()).unwrap()
    }

    #[test]
    fn duplicate_keys_merge() {
        let mut mt = Memtable::new(Schema::uncompressed());
        mt.apply(mutation(b"b"));
        mt.apply(mutation(b"a"));
        mt.apply(mutation(b"b"));
        assert_eq!(mt.partition_count(), 2);
        let applied: Vec<_> = mt.partitions().map(|(_, p)| p.applied).collect();
        assert_eq!(applied, vec![1, 2]);
    }

    #[test]
    fn iterates_in_key_order() {
        let mut mt = Memtable::new(Schema::uncompressed());
        let keys: [&[u8]; 4] = [b"~~", b"@", b"M", b"@A"];
        for k in keys {
            mt.apply(mutation(k));
        }
        let keys: Vec<_> = mt.partitions().map(|(k, _)| k.as_bytes().to_vec()).collect();
        assert_eq!(
            keys,
            vec![b"@".to_vec(), b"@A".to_vec(), b"M".to_vec(), b"~~".to_vec()]
        );
    }

    #[test]
    fn clear_empties() {
        let mut mt = Memtable::new(Schema::uncompressed());
        mt.apply(mutation(b"x"));
        assert!(!mt.is_empty());
        mt.clear();
        assert!(mt.is_empty());
        assert_eq!(mt.partition_count(), 0);
    }

    #[test]
    fn rejects_bad_keys() {
        let schema = Schema::uncompressed();
        assert!(matches!(
            Mutation::new(&schema, vec![]),
            Err(SchemaError::EmptyKey { .. })
        ));
        assert!(matches!(
            Mutation::new(&schema, vec![b'@'; crate::schema::MAX_PARTITION_KEY_SIZE + 1]),
            Err(SchemaError::KeyTooLarge { .. })
        ));
    }
}
