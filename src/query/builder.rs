//! Query builder
//!
//! `store.select::<T>(matchers)` returns a [`Query`]; shape it with
//! `skip`/`limit`/`reverse`/`order_by`, then run it with `find`, `iter`,
//! `first`, `count` or `delete`.
//!
//! A query that matches nothing is not an error: `find` returns an empty
//! `Vec` and `first` returns `None`.

use std::marker::PhantomData;

use serde::de::DeserializeOwned;

use crate::codec::{from_document, Document};
use crate::error::Result;
use crate::schema::Record;
use crate::store::Store;

use super::matcher::Matcher;
use super::planner::{Access, QuerySpec};

/// A pending query over one bucket
pub struct Query<'s, T> {
    store: &'s Store,
    bucket: String,
    spec: QuerySpec,
    _record: PhantomData<fn() -> T>,
}

impl<'s, T: Record> Query<'s, T> {
    pub(crate) fn new(store: &'s Store, matchers: Vec<Matcher>) -> Self {
        Self {
            store,
            bucket: T::BUCKET.to_string(),
            spec: QuerySpec {
                matchers,
                ..QuerySpec::default()
            },
            _record: PhantomData,
        }
    }

    /// AND another matcher onto the query
    pub fn and(mut self, matcher: Matcher) -> Self {
        self.spec.matchers.push(matcher);
        self
    }

    /// Read from a differently named bucket holding the same record shape
    pub fn bucket(mut self, name: impl Into<String>) -> Self {
        self.bucket = name.into();
        self
    }

    pub fn skip(mut self, n: usize) -> Self {
        self.spec.options.skip = n;
        self
    }

    /// Cap the number of results (0 = unbounded)
    pub fn limit(mut self, n: usize) -> Self {
        self.spec.options.limit = n;
        self
    }

    pub fn reverse(mut self) -> Self {
        self.spec.options.reverse = true;
        self
    }

    /// Order by a field value instead of the primary key
    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.spec.order_by = Some(field.into());
        self
    }

    pub fn matchers(&self) -> &[Matcher] {
        &self.spec.matchers
    }

    /// Which access path the planner would pick
    pub fn explain(&self) -> Result<Access> {
        self.store.explain_query(&self.bucket, &self.spec.matchers)
    }

    /// Run the query and collect every result
    pub fn find(self) -> Result<Vec<T>> {
        self.iter()?.collect()
    }

    /// Run the query and iterate the results
    ///
    /// Matching rows are collected as documents under the read lock, since
    /// the planner filters on decoded fields. Only the conversion into `T`
    /// is deferred until the iterator advances.
    pub fn iter(self) -> Result<Records<T>> {
        let rows = self.store.run_query(&self.bucket, &self.spec)?;
        Ok(Records::new(rows))
    }

    /// The first result, if any
    pub fn first(self) -> Result<Option<T>> {
        self.limit(1).iter()?.next().transpose()
    }

    /// Primary keys of the results, in result order
    pub fn keys(self) -> Result<Vec<u64>> {
        let rows = self.store.run_query(&self.bucket, &self.spec)?;
        Ok(rows.into_iter().map(|(key, _)| key).collect())
    }

    /// Number of results
    pub fn count(self) -> Result<usize> {
        Ok(self.store.run_query(&self.bucket, &self.spec)?.len())
    }

    /// Delete every matching record atomically; returns how many were removed
    pub fn delete(self) -> Result<usize> {
        self.store.delete_matching(&self.bucket, &self.spec)
    }
}

/// Query results, converted into `T` one row at a time
pub struct Records<T> {
    rows: std::vec::IntoIter<(u64, Document)>,
    _record: PhantomData<fn() -> T>,
}

impl<T> Records<T> {
    pub(crate) fn new(rows: Vec<(u64, Document)>) -> Self {
        Self {
            rows: rows.into_iter(),
            _record: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> Iterator for Records<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rows.next().map(|(_, document)| from_document(document))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.rows.size_hint()
    }
}

impl<T: DeserializeOwned> ExactSizeIterator for Records<T> {}
