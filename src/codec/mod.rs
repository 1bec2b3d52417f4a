//! Codec Module
//!
//! Turns typed records into bytes and back.
//!
//! ## Responsibilities
//! - Lower a `Serialize` record into a [`Document`] of flat [`Value`]s
//! - Rebuild a `DeserializeOwned` record from a [`Document`]
//! - Wrap documents in a bucket-tagged envelope for storage
//!
//! ## Stored Record Format
//! ```text
//! ┌────────────┬──────────────────┬────────────────────────────────┐
//! │Version (1) │ Bucket (len+utf8)│ Fields (count, [name, value]*) │
//! └────────────┴──────────────────┴────────────────────────────────┘
//! ```
//! (bincode, little-endian, fixed-width integers)

mod de;
mod document;
mod ser;
mod value;

pub use de::{from_document, ValueDeserializer};
pub use document::{decode_document, encode_document, Document};
pub use ser::{to_document, to_value};
pub use value::{Timestamp, Value, ValueClass};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;

/// Encode a typed record for `bucket`
pub fn encode<T: Serialize + ?Sized>(bucket: &str, record: &T) -> Result<Vec<u8>> {
    let document = to_document(record)?;
    encode_document(bucket, &document)
}

/// Decode bytes stored under `bucket` into a typed record
pub fn decode<T: DeserializeOwned>(bucket: &str, bytes: &[u8]) -> Result<T> {
    let document = decode_document(bucket, bytes)?;
    from_document(document)
}
