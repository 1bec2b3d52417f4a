//! Identifier allocation
//!
//! Keys are handed out as `high-water mark + 1` and never reused, even after
//! the record holding the highest key is deleted.

use crate::error::{AtlasError, Result};

/// Per-bucket identifier allocator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sequence {
    last: u64,
}

impl Sequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// The key the next allocation will return (does not allocate)
    pub fn peek_next(&self) -> Result<u64> {
        self.last
            .checked_add(1)
            .ok_or_else(|| AtlasError::Storage("identifier space exhausted".to_string()))
    }

    /// Record that `key` is in use; the mark only moves forward
    pub fn observe(&mut self, key: u64) {
        self.last = self.last.max(key);
    }

    /// Highest key ever observed (0 for a fresh bucket)
    pub fn last(&self) -> u64 {
        self.last
    }
}
