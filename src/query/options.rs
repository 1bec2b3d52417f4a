//! Result shaping options shared by `all`, `range`, `find` and `select`

/// Ordering, offset and cap applied to a result sequence
///
/// Ordering is fixed first, then `skip` records are dropped, then at most
/// `limit` are returned. A `limit` of 0 means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub limit: usize,
    pub skip: usize,
    pub reverse: bool,
}

impl ListOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn reverse(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Apply skip and limit to an already ordered iterator
    pub(crate) fn window<I: Iterator>(&self, iter: I) -> impl Iterator<Item = I::Item> {
        let take = if self.limit == 0 { usize::MAX } else { self.limit };
        iter.skip(self.skip).take(take)
    }
}
