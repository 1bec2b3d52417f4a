//! # AtlasDB
//!
//! An embedded, typed, single-file object store with:
//! - Typed buckets (one per record type) keyed by `u64` primary keys
//! - Auto-increment identifiers that are never reused
//! - Ordered field indexes with equality and range lookups
//! - Conjunctive matcher queries with skip/limit/reverse/order-by
//! - An append-only, checksummed store file with crash recovery
//! - Single-writer/multi-reader concurrency model
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Store handle                           │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┼─────────────────┐
//!          │            │                 │
//!          ▼            ▼                 ▼
//!   ┌─────────────┐ ┌─────────────┐ ┌─────────────┐
//!   │    Codec    │ │    Query    │ │   Journal   │
//!   │ (Documents) │ │  (Planner)  │ │  (Append)   │
//!   └─────────────┘ └──────┬──────┘ └─────────────┘
//!                          │
//!                          ▼
//!                  ┌───────────────┐
//!                  │    Buckets    │
//!                  │ records+index │
//!                  └───────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use atlasdb::{q, Config, ListOptions, Record, Schema, Store};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Entry {
//!     id: u64,
//!     food: String,
//!     calories: i64,
//! }
//!
//! impl Record for Entry {
//!     const BUCKET: &'static str = "Entry";
//! }
//!
//! # fn main() -> atlasdb::Result<()> {
//! let config = Config::builder()
//!     .path("./entries.db")
//!     .schema(Schema::of::<Entry>().index("food"))
//!     .build();
//! let store = Store::open(config)?;
//!
//! let mut entry = Entry { id: 0, food: "bread".into(), calories: 300 };
//! store.save(&mut entry)?;
//! assert_eq!(entry.id, 1);
//!
//! let bread: Vec<Entry> = store.select::<Entry>([q::eq("food", "bread")]).find()?;
//! let everything: Vec<Entry> = store.all(ListOptions::new().reverse())?;
//! # let _ = (bread, everything);
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod schema;

pub mod codec;
pub mod journal;
pub mod index;
pub mod bucket;
pub mod query;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{AtlasError, ErrorKind, Result};
pub use config::{Config, SyncStrategy};
pub use schema::{IndexSpec, KeyKind, Record, Schema};
pub use codec::{Document, Timestamp, Value};
pub use query::{q, Access, ListOptions, Matcher, Op, Query, Records};
pub use store::{Store, StoreStats};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of AtlasDB
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
