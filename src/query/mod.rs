//! Query Module
//!
//! Conjunctive matcher queries over a bucket.
//!
//! ## Responsibilities
//! - Build immutable single-field matchers (`eq`, `gt`, `lt`, ...)
//! - Plan: narrowest index-backed matcher first, full scan otherwise
//! - Filter candidates with every matcher, then order, skip and limit
//!
//! ```ignore
//! use atlasdb::q;
//!
//! let bread: Vec<Entry> = store
//!     .select::<Entry>([q::eq("calories", 300), q::eq("food", "bread")])
//!     .find()?;
//! ```

mod builder;
mod matcher;
mod options;
mod planner;

pub use builder::{Query, Records};
pub use matcher::{Matcher, Op};
pub use options::ListOptions;
pub use planner::Access;

pub(crate) use planner::{execute, explain, QuerySpec};

/// Matcher constructors
pub mod q {
    pub use super::matcher::{eq, gt, gte, in_values, lt, lte};
}
