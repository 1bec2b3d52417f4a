//! Bucket Module
//!
//! A bucket is the partition holding every record of one type: records in
//! primary-key order, the field indexes derived from them, and the
//! identifier allocator.
//!
//! Mutations here are infallible. Everything that can fail (encoding,
//! unique checks, journaling) happens before the store calls into a bucket,
//! so memory never reflects a half-applied operation.

mod sequence;

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::codec::{decode_document, Document};
use crate::error::{AtlasError, Result};
use crate::index::FieldIndex;
use crate::schema::Schema;

pub use sequence::Sequence;

/// Records and indexes of one bucket
#[derive(Debug)]
pub struct Bucket {
    schema: Schema,
    records: BTreeMap<u64, Bytes>,
    indexes: BTreeMap<String, FieldIndex>,
    sequence: Sequence,
}

impl Bucket {
    /// Create an empty bucket for `schema`
    pub fn new(schema: Schema) -> Self {
        let indexes = schema
            .indexes()
            .iter()
            .map(|spec| (spec.field.clone(), FieldIndex::new(spec)))
            .collect();
        Self {
            schema,
            records: BTreeMap::new(),
            indexes,
            sequence: Sequence::new(),
        }
    }

    pub fn name(&self) -> &str {
        self.schema.bucket()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn sequence_mut(&mut self) -> &mut Sequence {
        &mut self.sequence
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn get(&self, key: u64) -> Option<&Bytes> {
        self.records.get(&key)
    }

    pub fn contains(&self, key: u64) -> bool {
        self.records.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Live keys in ascending order
    pub fn keys(&self) -> impl DoubleEndedIterator<Item = u64> + '_ {
        self.records.keys().copied()
    }

    /// Live records in ascending key order
    pub fn records(&self) -> impl DoubleEndedIterator<Item = (u64, &Bytes)> + '_ {
        self.records.iter().map(|(k, v)| (*k, v))
    }

    pub fn index(&self, field: &str) -> Option<&FieldIndex> {
        self.indexes.get(field)
    }

    /// Decode the document stored under `key`
    pub fn document(&self, key: u64) -> Result<Option<Document>> {
        self.records
            .get(&key)
            .map(|bytes| decode_document(self.name(), bytes))
            .transpose()
    }

    /// Fail if saving `document` under `key` would break a unique index
    pub fn check_unique(&self, key: u64, document: &Document) -> Result<()> {
        for index in self.indexes.values() {
            if index.conflicts(key, document.value(index.field())) {
                return Err(AtlasError::UniqueViolation {
                    bucket: self.name().to_string(),
                    field: index.field().to_string(),
                });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Insert or replace a record; returns true if a record was replaced
    pub fn put(&mut self, key: u64, bytes: Bytes, document: &Document) -> bool {
        for index in self.indexes.values_mut() {
            index.insert(key, document.value(index.field()));
        }
        self.sequence.observe(key);
        self.records.insert(key, bytes).is_some()
    }

    /// Remove a record and every index entry pointing at it
    pub fn remove(&mut self, key: u64) -> Option<Bytes> {
        let removed = self.records.remove(&key)?;
        for index in self.indexes.values_mut() {
            index.remove(key);
        }
        Some(removed)
    }

    /// Remove every record; returns how many were removed
    pub fn clear(&mut self) -> usize {
        let count = self.records.len();
        self.records.clear();
        for index in self.indexes.values_mut() {
            index.clear();
        }
        count
    }

    // =========================================================================
    // Re-indexing
    // =========================================================================

    /// Build the indexes `schema` declares from the stored records
    ///
    /// Leaves the bucket untouched; fails on undecodable records or unique
    /// conflicts.
    pub fn build_indexes(&self, schema: &Schema) -> Result<BTreeMap<String, FieldIndex>> {
        let mut indexes: BTreeMap<String, FieldIndex> = schema
            .indexes()
            .iter()
            .map(|spec| (spec.field.clone(), FieldIndex::new(spec)))
            .collect();

        if indexes.is_empty() {
            return Ok(indexes);
        }

        for (key, bytes) in &self.records {
            let document = decode_document(self.name(), bytes)?;
            for index in indexes.values_mut() {
                let value = document.value(index.field());
                if index.conflicts(*key, value) {
                    return Err(AtlasError::UniqueViolation {
                        bucket: self.name().to_string(),
                        field: index.field().to_string(),
                    });
                }
                index.insert(*key, value);
            }
        }

        Ok(indexes)
    }

    /// Swap in a new schema together with indexes built for it
    pub fn replace_schema(&mut self, schema: Schema, indexes: BTreeMap<String, FieldIndex>) {
        self.schema = schema;
        self.indexes = indexes;
    }
}
