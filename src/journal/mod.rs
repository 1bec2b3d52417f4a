//! Journal Module
//!
//! The single store file: an append-only log of operations.
//!
//! ## Responsibilities
//! - Append one frame per mutation before it becomes visible
//! - CRC32 checksums for corruption detection
//! - Recovery and replay on open (torn final writes are cut off)
//! - Compaction into a fresh file holding only live state
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ Header: Magic "ATDB" (4) | Version (2)  │
//! ├─────────────────────────────────────────┤
//! │ Frame 1                                 │
//! │ ┌─────────┬─────────┬─────────────────┐ │
//! │ │ Len (4) │ CRC (4) │ Operation       │ │
//! │ └─────────┴─────────┴─────────────────┘ │
//! ├─────────────────────────────────────────┤
//! │ Frame 2 ...                             │
//! └─────────────────────────────────────────┘
//! ```

mod entry;
mod recovery;
mod writer;

pub use entry::{encode_frame, Operation, FRAME_HEADER_SIZE, HEADER_SIZE, MAGIC, VERSION};
pub use recovery::{JournalRecovery, RecoveryReport};
pub use writer::Journal;
