//! Index Module
//!
//! Ordered per-field indexes: field value → set of primary keys.
//!
//! ## Responsibilities
//! - Equality and range lookups without scanning the bucket
//! - Reverse map (key → value) so replacing or removing a record never
//!   needs the old record bytes
//! - Unique constraint checks
//!
//! ## Data Structure Choice
//! `BTreeMap<Value, BTreeSet<u64>>`: values are totally ordered (see
//! [`Value`]), so range scans walk the map in value order and keys within a
//! value come out ascending. Null (absent) values are never indexed.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Bound;

use crate::codec::{Value, ValueClass};
use crate::schema::IndexSpec;

/// One index over one field of one bucket
#[derive(Debug, Clone)]
pub struct FieldIndex {
    field: String,
    unique: bool,
    entries: BTreeMap<Value, BTreeSet<u64>>,
    by_key: HashMap<u64, Value>,
}

impl FieldIndex {
    pub fn new(spec: &IndexSpec) -> Self {
        Self {
            field: spec.field.clone(),
            unique: spec.unique,
            entries: BTreeMap::new(),
            by_key: HashMap::new(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Point `key` at `value`, dropping whatever it pointed at before
    pub fn insert(&mut self, key: u64, value: &Value) {
        self.remove(key);
        if value.is_null() {
            return;
        }
        self.entries.entry(value.clone()).or_default().insert(key);
        self.by_key.insert(key, value.clone());
    }

    /// Forget `key`; empty value entries are removed with it
    pub fn remove(&mut self, key: u64) {
        let Some(old) = self.by_key.remove(&key) else {
            return;
        };
        if let Some(keys) = self.entries.get_mut(&old) {
            keys.remove(&key);
            if keys.is_empty() {
                self.entries.remove(&old);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.by_key.clear();
    }

    /// Keys whose field equals `value` (ascending)
    pub fn eq(&self, value: &Value) -> Vec<u64> {
        self.entries
            .get(value)
            .map(|keys| keys.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Keys whose field lies within the bounds, in (value, key) order
    ///
    /// Only values of the bounds' class are returned, so `Gt(5)` never
    /// yields string or timestamp entries.
    pub fn range(&self, lower: Bound<&Value>, upper: Bound<&Value>) -> Vec<u64> {
        if bounds_are_empty(lower, upper) {
            return Vec::new();
        }

        let class = bound_class(lower).or_else(|| bound_class(upper));
        self.entries
            .range::<Value, _>((lower, upper))
            .filter(|(value, _)| class.map_or(true, |c| value.class() == c))
            .flat_map(|(_, keys)| keys.iter().copied())
            .collect()
    }

    /// All indexed keys ordered by value, then key
    pub fn ordered_keys(&self) -> Vec<u64> {
        self.entries.values().flatten().copied().collect()
    }

    /// The value currently indexed for `key`
    pub fn value_of(&self, key: u64) -> Option<&Value> {
        self.by_key.get(&key)
    }

    /// For a unique index: would storing `value` under `key` collide?
    pub fn conflicts(&self, key: u64, value: &Value) -> bool {
        if !self.unique || value.is_null() {
            return false;
        }
        self.entries
            .get(value)
            .is_some_and(|keys| keys.iter().any(|&k| k != key))
    }

    /// Number of distinct indexed values
    pub fn distinct_values(&self) -> usize {
        self.entries.len()
    }

    /// Number of indexed keys
    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

fn bound_class(bound: Bound<&Value>) -> Option<ValueClass> {
    match bound {
        Bound::Included(v) | Bound::Excluded(v) => Some(v.class()),
        Bound::Unbounded => None,
    }
}

/// `BTreeMap::range` panics on inverted or empty-exclusive bounds
fn bounds_are_empty(lower: Bound<&Value>, upper: Bound<&Value>) -> bool {
    match (lower, upper) {
        (Bound::Included(lo), Bound::Included(hi)) => lo > hi,
        (Bound::Included(lo), Bound::Excluded(hi))
        | (Bound::Excluded(lo), Bound::Included(hi))
        | (Bound::Excluded(lo), Bound::Excluded(hi)) => lo >= hi,
        _ => false,
    }
}
