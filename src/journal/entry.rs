//! Journal entry definitions
//!
//! Defines the operations recorded in the store file and their framing.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};
use crate::schema::Schema;

/// Magic bytes identifying an AtlasDB store file
pub const MAGIC: &[u8; 4] = b"ATDB";

/// Current file format version
pub const VERSION: u16 = 1;

/// File header size: Magic (4) + Version (2)
pub const HEADER_SIZE: u64 = 6;

/// Frame header size: Len (4) + CRC (4)
pub const FRAME_HEADER_SIZE: u64 = 8;

/// Largest payload a single frame may carry (256 MB)
pub const MAX_FRAME_SIZE: u32 = 256 * 1024 * 1024;

/// Operations that can be journaled
///
/// Each mutation of the store is exactly one operation, so a record and the
/// index changes derived from it commit or vanish together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Operation {
    /// Declare or replace a bucket schema
    Schema(Schema),

    /// Insert or replace a record (envelope bytes)
    Put {
        bucket: String,
        key: u64,
        record: Vec<u8>,
    },

    /// Remove a record
    Delete { bucket: String, key: u64 },

    /// Remove several records at once
    DeleteMany { bucket: String, keys: Vec<u64> },

    /// Identifier high-water mark (written by compaction)
    Sequence { bucket: String, last: u64 },

    /// Remove every record of a bucket, keeping its schema and sequence
    DropBucket { bucket: String },
}

impl Operation {
    /// The bucket this operation touches
    pub fn bucket(&self) -> &str {
        match self {
            Operation::Schema(schema) => schema.bucket(),
            Operation::Put { bucket, .. }
            | Operation::Delete { bucket, .. }
            | Operation::DeleteMany { bucket, .. }
            | Operation::Sequence { bucket, .. }
            | Operation::DropBucket { bucket } => bucket,
        }
    }
}

/// The file header bytes
pub fn file_header() -> [u8; HEADER_SIZE as usize] {
    let mut header = [0u8; HEADER_SIZE as usize];
    header[0..4].copy_from_slice(MAGIC);
    header[4..6].copy_from_slice(&VERSION.to_le_bytes());
    header
}

/// Encode an operation into a framed byte buffer
///
/// Format: `[len u32 LE][crc32 u32 LE][bincode payload]`
pub fn encode_frame(operation: &Operation) -> Result<Bytes> {
    let payload =
        bincode::serialize(operation).map_err(|e| AtlasError::Encoding(e.to_string()))?;

    if payload.len() > MAX_FRAME_SIZE as usize {
        return Err(AtlasError::Encoding(format!(
            "Frame too large: {} bytes (max {})",
            payload.len(),
            MAX_FRAME_SIZE
        )));
    }

    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE as usize + payload.len());
    frame.put_u32_le(payload.len() as u32);
    frame.put_u32_le(crc32fast::hash(&payload));
    frame.put_slice(&payload);

    Ok(frame.freeze())
}

/// Decode a frame payload whose CRC has already been checked
pub fn decode_payload(payload: &[u8]) -> Result<Operation> {
    bincode::deserialize(payload).map_err(|e| AtlasError::Decoding(e.to_string()))
}
