//! Store Module
//!
//! The store handle: owns the backing file and every bucket reachable
//! through it.
//!
//! ## Responsibilities
//! - Open the file exclusively and replay it into memory
//! - Route saves through key allocation, the codec, the journal and the
//!   bucket indexes as one atomic unit
//! - Serve reads and queries concurrently
//! - Compact the file when enough stale frames pile up

use std::collections::BTreeMap;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::bucket::Bucket;
use crate::codec::{self, decode_document, encode_document, Document, Value};
use crate::config::Config;
use crate::error::{AtlasError, Result};
use crate::journal::{Journal, Operation, RecoveryReport};
use crate::query::{self, Access, ListOptions, Matcher, Query, QuerySpec};
use crate::schema::{KeyKind, Record, Schema};

/// The store handle
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (save/delete/drop/register/compact): hold `buckets` for
///   writing for the whole operation
///   - Only ONE write operation at a time
///   - Lock order: buckets (write) → journal
///   - Key allocation happens under the same lock, so two concurrent saves
///     never see the same next identifier
///
/// - **Reads** (get/all/range/select/count): hold `buckets` for reading
///   - Any number of readers run together; they never touch the journal
///
/// The file itself is locked exclusively (`fs2`) for the handle's lifetime.
pub struct Store {
    /// Store configuration
    config: Config,

    /// Every bucket, keyed by name; the writer lock for the whole store
    buckets: RwLock<BTreeMap<String, Bucket>>,

    /// The backing file (only touched while `buckets` is write-locked)
    journal: Mutex<JournalState>,

    /// What recovery found when the file was opened
    recovery: RecoveryReport,
}

/// Journal plus the bookkeeping that decides when to compact
struct JournalState {
    journal: Journal,
    /// Frames in the file that no longer describe live state
    stale_frames: usize,
}

/// Summary counters for a store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub buckets: usize,
    pub records: usize,
    pub file_bytes: u64,
    pub stale_frames: usize,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Lock and recover the store file (torn tail is cut off)
    /// 2. Replay every operation into buckets and indexes
    /// 3. Register configured schemas (re-indexing changed ones)
    /// 4. Ready to serve requests
    pub fn open(config: Config) -> Result<Self> {
        // Step 1: Lock the file and read back every intact operation
        let (journal, operations, recovery) = Journal::open(&config.path, config.sync_strategy)?;

        // Step 2: Replay
        let mut buckets = BTreeMap::new();
        let mut stale_frames = 0;
        for operation in operations {
            stale_frames += replay(&mut buckets, operation)?;
        }

        let store = Self {
            config,
            buckets: RwLock::new(buckets),
            journal: Mutex::new(JournalState {
                journal,
                stale_frames,
            }),
            recovery,
        };

        // Step 3: Configured schemas
        for schema in store.config.schemas.clone() {
            store.register(schema)?;
        }

        info!(
            path = %store.config.path.display(),
            frames = recovery.frames_recovered,
            truncated = recovery.bytes_truncated,
            buckets = store.buckets.read().len(),
            "store opened"
        );

        Ok(store)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified file
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        let config = Config::builder().path(path.as_ref()).build();
        Self::open(config)
    }

    // =========================================================================
    // Schemas
    // =========================================================================

    /// Register or replace a bucket schema
    ///
    /// Replacing a schema rebuilds the bucket's indexes from its records.
    /// Registering an identical schema is a no-op.
    pub fn register(&self, schema: Schema) -> Result<()> {
        validate_schema(&schema)?;

        let mut buckets = self.buckets.write();
        let mut journal = self.journal.lock();

        let replaced = match buckets.get(schema.bucket()) {
            Some(bucket) if bucket.schema() == &schema => return Ok(()),
            Some(bucket) => Some(bucket.build_indexes(&schema)?),
            None => None,
        };

        journal.journal.append(&Operation::Schema(schema.clone()))?;

        let name = schema.bucket().to_string();
        match replaced {
            Some(indexes) => {
                if let Some(bucket) = buckets.get_mut(&name) {
                    bucket.replace_schema(schema, indexes);
                }
                journal.stale_frames += 1;
                info!(bucket = %name, "schema replaced; indexes rebuilt");
            }
            None => {
                buckets.insert(name.clone(), Bucket::new(schema));
                debug!(bucket = %name, "schema registered");
            }
        }

        Ok(())
    }

    /// The schema registered for `bucket`
    pub fn schema(&self, bucket: &str) -> Option<Schema> {
        self.buckets.read().get(bucket).map(|b| b.schema().clone())
    }

    /// Names of every registered bucket
    pub fn bucket_names(&self) -> Vec<String> {
        self.buckets.read().keys().cloned().collect()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert or replace a record
    ///
    /// If the record's key is unset (zero or absent) the bucket's next
    /// identifier is assigned and, once the save has committed, written back
    /// into `record`. Returns the record's key.
    pub fn save<T: Record>(&self, record: &mut T) -> Result<u64> {
        let mut document = codec::to_document(record)?;

        let mut buckets = self.buckets.write();
        let bucket = buckets
            .get_mut(T::BUCKET)
            .ok_or_else(|| AtlasError::UnknownBucket(T::BUCKET.to_string()))?;

        // Step 1: Resolve the primary key (allocating if unset)
        let key_field = bucket.schema().key_field().to_string();
        let mut assigned = None;
        let key = match document.value(&key_field).as_key() {
            Some(Some(key)) => key,
            Some(None) if bucket.schema().key_kind() == KeyKind::Manual => {
                return Err(AtlasError::MissingKey(format!(
                    "bucket '{}' requires an explicit '{}'",
                    T::BUCKET,
                    key_field
                )));
            }
            Some(None) => {
                let key = bucket.sequence().peek_next()?;
                document.insert(key_field.as_str(), key);
                assigned = Some(codec::from_document::<T>(document.clone())?);
                key
            }
            None => {
                return Err(AtlasError::MissingKey(format!(
                    "'{}.{}' must be an unsigned integer, got {}",
                    T::BUCKET,
                    key_field,
                    document.value(&key_field)
                )));
            }
        };

        // Step 2: Constraints, then encode
        bucket.check_unique(key, &document)?;
        let bytes = Bytes::from(encode_document(T::BUCKET, &document)?);

        // Step 3: Journal first (a failed append leaves memory untouched)
        let mut journal = self.journal.lock();
        journal.journal.append(&Operation::Put {
            bucket: T::BUCKET.to_string(),
            key,
            record: bytes.to_vec(),
        })?;

        // Step 4: Apply to the bucket and its indexes
        if bucket.put(key, bytes, &document) {
            journal.stale_frames += 1;
        }
        if let Some(updated) = assigned {
            *record = updated;
        }
        debug!(bucket = T::BUCKET, key, "record saved");

        self.maybe_compact(&buckets, &mut journal);
        Ok(key)
    }

    /// Delete a record by key
    pub fn delete<T: Record>(&self, key: u64) -> Result<()> {
        self.delete_from(T::BUCKET, key)
    }

    /// Delete a record by bucket name and key
    pub fn delete_from(&self, bucket_name: &str, key: u64) -> Result<()> {
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .get_mut(bucket_name)
            .ok_or_else(|| AtlasError::UnknownBucket(bucket_name.to_string()))?;

        if !bucket.contains(key) {
            return Err(AtlasError::KeyNotFound {
                bucket: bucket_name.to_string(),
                key,
            });
        }

        let mut journal = self.journal.lock();
        journal.journal.append(&Operation::Delete {
            bucket: bucket_name.to_string(),
            key,
        })?;

        bucket.remove(key);
        journal.stale_frames += 2;
        debug!(bucket = bucket_name, key, "record deleted");

        self.maybe_compact(&buckets, &mut journal);
        Ok(())
    }

    /// Remove every record of a bucket (schema and key sequence survive)
    pub fn drop_bucket<T: Record>(&self) -> Result<usize> {
        self.drop_bucket_named(T::BUCKET)
    }

    pub fn drop_bucket_named(&self, bucket_name: &str) -> Result<usize> {
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .get_mut(bucket_name)
            .ok_or_else(|| AtlasError::UnknownBucket(bucket_name.to_string()))?;

        let mut journal = self.journal.lock();
        journal.journal.append(&Operation::DropBucket {
            bucket: bucket_name.to_string(),
        })?;

        let removed = bucket.clear();
        journal.stale_frames += removed + 1;
        info!(bucket = bucket_name, removed, "bucket dropped");

        self.maybe_compact(&buckets, &mut journal);
        Ok(removed)
    }

    /// Delete everything a query matches, as one journal frame
    pub(crate) fn delete_matching(&self, bucket_name: &str, spec: &QuerySpec) -> Result<usize> {
        let mut buckets = self.buckets.write();
        let bucket = buckets
            .get_mut(bucket_name)
            .ok_or_else(|| AtlasError::UnknownBucket(bucket_name.to_string()))?;

        let keys: Vec<u64> = query::execute(bucket, spec)?
            .into_iter()
            .map(|(key, _)| key)
            .collect();
        if keys.is_empty() {
            return Ok(0);
        }

        let mut journal = self.journal.lock();
        journal.journal.append(&Operation::DeleteMany {
            bucket: bucket_name.to_string(),
            keys: keys.clone(),
        })?;

        for key in &keys {
            bucket.remove(*key);
        }
        journal.stale_frames += keys.len() + 1;
        debug!(bucket = bucket_name, removed = keys.len(), "query delete");

        self.maybe_compact(&buckets, &mut journal);
        Ok(keys.len())
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get a record by key
    pub fn get<T: Record>(&self, key: u64) -> Result<T> {
        let bytes = {
            let buckets = self.buckets.read();
            let bucket = bucket_ref(&buckets, T::BUCKET)?;
            bucket.get(key).cloned().ok_or_else(|| AtlasError::KeyNotFound {
                bucket: T::BUCKET.to_string(),
                key,
            })?
        };
        codec::decode(T::BUCKET, &bytes)
    }

    /// Every record in primary-key order, shaped by `options`
    pub fn all<T: Record>(&self, options: ListOptions) -> Result<Vec<T>> {
        let spec = QuerySpec {
            options,
            ..QuerySpec::default()
        };
        decode_rows(self.run_query(T::BUCKET, &spec)?)
    }

    /// Records whose `field` lies in `[lower, upper]`, ordered by that field
    pub fn range<T: Record>(
        &self,
        field: &str,
        lower: impl Into<Value>,
        upper: impl Into<Value>,
        options: ListOptions,
    ) -> Result<Vec<T>> {
        let spec = QuerySpec {
            matchers: vec![query::q::gte(field, lower), query::q::lte(field, upper)],
            options,
            order_by: Some(field.to_string()),
        };
        decode_rows(self.run_query(T::BUCKET, &spec)?)
    }

    /// Records whose `field` equals `value` (empty if none)
    pub fn find<T: Record>(
        &self,
        field: &str,
        value: impl Into<Value>,
        options: ListOptions,
    ) -> Result<Vec<T>> {
        let spec = QuerySpec {
            matchers: vec![query::q::eq(field, value)],
            options,
            order_by: None,
        };
        decode_rows(self.run_query(T::BUCKET, &spec)?)
    }

    /// The first record whose `field` equals `value`
    ///
    /// Unlike [`Store::find`], no match is a `NotFound` error.
    pub fn one<T: Record>(&self, field: &str, value: impl Into<Value>) -> Result<T> {
        let value = value.into();
        let spec = QuerySpec {
            matchers: vec![query::q::eq(field, value.clone())],
            options: ListOptions::new().limit(1),
            order_by: None,
        };
        decode_rows(self.run_query(T::BUCKET, &spec)?)?
            .pop()
            .ok_or_else(|| {
                AtlasError::NotFound(format!("no '{}' record with {} == {}", T::BUCKET, field, value))
            })
    }

    /// Start a conjunctive query
    pub fn select<T: Record>(&self, matchers: impl IntoIterator<Item = Matcher>) -> Query<'_, T> {
        Query::new(self, matchers.into_iter().collect())
    }

    /// Number of records in a bucket
    pub fn count<T: Record>(&self) -> Result<usize> {
        self.count_in(T::BUCKET)
    }

    pub fn count_in(&self, bucket_name: &str) -> Result<usize> {
        let buckets = self.buckets.read();
        Ok(bucket_ref(&buckets, bucket_name)?.len())
    }

    /// The key the next auto-assigned save in `bucket` would receive
    pub fn next_id(&self, bucket_name: &str) -> Result<u64> {
        let buckets = self.buckets.read();
        bucket_ref(&buckets, bucket_name)?.sequence().peek_next()
    }

    /// Untyped scan of a bucket, for tooling
    pub fn documents(&self, bucket_name: &str, options: ListOptions) -> Result<Vec<(u64, Document)>> {
        let spec = QuerySpec {
            options,
            ..QuerySpec::default()
        };
        self.run_query(bucket_name, &spec)
    }

    // =========================================================================
    // Index Layer
    // =========================================================================

    /// Keys whose indexed `field` equals `value`, ascending
    pub fn index_eq(&self, bucket_name: &str, field: &str, value: impl Into<Value>) -> Result<Vec<u64>> {
        let buckets = self.buckets.read();
        let bucket = bucket_ref(&buckets, bucket_name)?;
        let index = bucket.index(field).ok_or_else(|| no_index(bucket_name, field))?;
        Ok(index.eq(&value.into()))
    }

    /// Keys whose indexed `field` lies within the bounds, in value order
    pub fn index_range(
        &self,
        bucket_name: &str,
        field: &str,
        lower: Bound<Value>,
        upper: Bound<Value>,
    ) -> Result<Vec<u64>> {
        let buckets = self.buckets.read();
        let bucket = bucket_ref(&buckets, bucket_name)?;
        let index = bucket.index(field).ok_or_else(|| no_index(bucket_name, field))?;
        Ok(index.range(lower.as_ref(), upper.as_ref()))
    }

    // =========================================================================
    // Query plumbing
    // =========================================================================

    pub(crate) fn run_query(&self, bucket_name: &str, spec: &QuerySpec) -> Result<Vec<(u64, Document)>> {
        let buckets = self.buckets.read();
        query::execute(bucket_ref(&buckets, bucket_name)?, spec)
    }

    pub(crate) fn explain_query(&self, bucket_name: &str, matchers: &[Matcher]) -> Result<Access> {
        let buckets = self.buckets.read();
        Ok(query::explain(bucket_ref(&buckets, bucket_name)?, matchers))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Rewrite the file so it holds only live state
    pub fn compact(&self) -> Result<()> {
        let buckets = self.buckets.write();
        let mut journal = self.journal.lock();
        compact_locked(&buckets, &mut journal)
    }

    /// Runs after a mutation has committed, so a failed compaction is only
    /// logged; the stale count stays put and the next write retries.
    fn maybe_compact(&self, buckets: &BTreeMap<String, Bucket>, journal: &mut JournalState) {
        let threshold = self.config.compaction_threshold;
        if threshold > 0 && journal.stale_frames >= threshold {
            if let Err(e) = compact_locked(buckets, journal) {
                warn!(
                    stale_frames = journal.stale_frames,
                    error = %e,
                    "automatic compaction failed"
                );
            }
        }
    }

    /// Summary counters
    pub fn stats(&self) -> StoreStats {
        let buckets = self.buckets.read();
        let journal = self.journal.lock();
        StoreStats {
            buckets: buckets.len(),
            records: buckets.values().map(Bucket::len).sum(),
            file_bytes: journal.journal.offset(),
            stale_frames: journal.stale_frames,
        }
    }

    /// What recovery found when the store was opened
    pub fn recovery_report(&self) -> RecoveryReport {
        self.recovery
    }

    /// Get the store file path
    pub fn path(&self) -> &Path {
        &self.config.path
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Close the store gracefully
    ///
    /// Syncs the file and releases its lock.
    pub fn close(self) -> Result<()> {
        let path: PathBuf = self.config.path.clone();
        self.journal.into_inner().journal.close()?;
        info!(path = %path.display(), "store closed");
        Ok(())
    }
}

// =============================================================================
// Private Helpers
// =============================================================================

fn bucket_ref<'a>(buckets: &'a BTreeMap<String, Bucket>, name: &str) -> Result<&'a Bucket> {
    buckets
        .get(name)
        .ok_or_else(|| AtlasError::UnknownBucket(name.to_string()))
}

fn no_index(bucket: &str, field: &str) -> AtlasError {
    AtlasError::NotFound(format!("no index on '{}.{}'", bucket, field))
}

fn decode_rows<T: Record>(rows: Vec<(u64, Document)>) -> Result<Vec<T>> {
    rows.into_iter()
        .map(|(_, document)| codec::from_document(document))
        .collect()
}

fn validate_schema(schema: &Schema) -> Result<()> {
    if schema.bucket().is_empty() {
        return Err(AtlasError::Config("bucket name must not be empty".to_string()));
    }
    if schema.key_field().is_empty() {
        return Err(AtlasError::Config(format!(
            "bucket '{}' has an empty primary-key field",
            schema.bucket()
        )));
    }
    if schema.indexes().iter().any(|spec| spec.field.is_empty()) {
        return Err(AtlasError::Config(format!(
            "bucket '{}' declares an index on an empty field name",
            schema.bucket()
        )));
    }
    Ok(())
}

/// Apply one recovered operation; returns how many frames it made stale
fn replay(buckets: &mut BTreeMap<String, Bucket>, operation: Operation) -> Result<usize> {
    match operation {
        Operation::Schema(schema) => {
            let name = schema.bucket().to_string();
            match buckets.get_mut(&name) {
                Some(bucket) => {
                    let indexes = bucket.build_indexes(&schema)?;
                    bucket.replace_schema(schema, indexes);
                    Ok(1)
                }
                None => {
                    buckets.insert(name, Bucket::new(schema));
                    Ok(0)
                }
            }
        }
        Operation::Put { bucket, key, record } => {
            let target = replay_bucket(buckets, &bucket)?;
            let document = decode_document(&bucket, &record)?;
            Ok(usize::from(target.put(key, Bytes::from(record), &document)))
        }
        Operation::Delete { bucket, key } => {
            let target = replay_bucket(buckets, &bucket)?;
            Ok(if target.remove(key).is_some() { 2 } else { 1 })
        }
        Operation::DeleteMany { bucket, keys } => {
            let target = replay_bucket(buckets, &bucket)?;
            let removed = keys.iter().filter(|key| target.remove(**key).is_some()).count();
            Ok(removed + 1)
        }
        Operation::Sequence { bucket, last } => {
            replay_bucket(buckets, &bucket)?.sequence_mut().observe(last);
            Ok(0)
        }
        Operation::DropBucket { bucket } => {
            let removed = replay_bucket(buckets, &bucket)?.clear();
            Ok(removed + 1)
        }
    }
}

fn replay_bucket<'a>(buckets: &'a mut BTreeMap<String, Bucket>, name: &str) -> Result<&'a mut Bucket> {
    buckets.get_mut(name).ok_or_else(|| {
        AtlasError::Corruption(format!("operation on bucket '{}' before its schema", name))
    })
}

/// Rewrite the journal as schemas + sequences + live records
fn compact_locked(buckets: &BTreeMap<String, Bucket>, journal: &mut JournalState) -> Result<()> {
    let mut operations = Vec::new();
    for bucket in buckets.values() {
        operations.push(Operation::Schema(bucket.schema().clone()));
        if bucket.sequence().last() > 0 {
            operations.push(Operation::Sequence {
                bucket: bucket.name().to_string(),
                last: bucket.sequence().last(),
            });
        }
        for (key, bytes) in bucket.records() {
            operations.push(Operation::Put {
                bucket: bucket.name().to_string(),
                key,
                record: bytes.to_vec(),
            });
        }
    }

    journal.journal.rewrite(&operations)?;
    journal.stale_frames = 0;
    Ok(())
}
