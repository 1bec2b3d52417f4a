//! Bucket schemas
//!
//! A schema ties a bucket name to its primary-key field, its key allocation
//! policy and the fields that carry an index. Schemas are registered when the
//! store is opened and persisted alongside the data.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A typed record stored in its own bucket
///
/// ```
/// use atlasdb::Record;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize)]
/// struct Weight {
///     id: u64,
///     weight: f64,
/// }
///
/// impl Record for Weight {
///     const BUCKET: &'static str = "Weight";
/// }
/// ```
pub trait Record: Serialize + DeserializeOwned {
    /// Bucket (type tag) this record lives in
    const BUCKET: &'static str;
}

/// How primary keys are assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    /// Unset keys (zero or absent) get the bucket's next identifier
    AutoIncrement,

    /// The caller must always supply a key
    Manual,
}

/// A declared index on one field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub field: String,
    pub unique: bool,
}

/// Per-bucket configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    bucket: String,
    key_field: String,
    key_kind: KeyKind,
    indexes: Vec<IndexSpec>,
}

impl Schema {
    /// Default primary-key field name
    pub const DEFAULT_KEY_FIELD: &'static str = "id";

    /// Start a schema for `bucket` with an auto-increment `id` key
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key_field: Self::DEFAULT_KEY_FIELD.to_string(),
            key_kind: KeyKind::AutoIncrement,
            indexes: Vec::new(),
        }
    }

    /// Schema for a [`Record`] type
    pub fn of<R: Record>() -> Self {
        Self::new(R::BUCKET)
    }

    /// Use a different primary-key field
    pub fn key(mut self, field: impl Into<String>) -> Self {
        self.key_field = field.into();
        self
    }

    /// Require callers to supply keys
    pub fn manual_keys(mut self) -> Self {
        self.key_kind = KeyKind::Manual;
        self
    }

    /// Add a non-unique index on `field`
    pub fn index(self, field: impl Into<String>) -> Self {
        self.with_index(field.into(), false)
    }

    /// Add a unique index on `field`
    pub fn unique(self, field: impl Into<String>) -> Self {
        self.with_index(field.into(), true)
    }

    fn with_index(mut self, field: String, unique: bool) -> Self {
        // Re-declaring a field replaces the earlier declaration.
        self.indexes.retain(|spec| spec.field != field);
        self.indexes.push(IndexSpec { field, unique });
        self
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn key_kind(&self) -> KeyKind {
        self.key_kind
    }

    pub fn indexes(&self) -> &[IndexSpec] {
        &self.indexes
    }

    /// Whether `field` carries an index
    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexes.iter().any(|spec| spec.field == field)
    }
}
