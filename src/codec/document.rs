//! Documents and the stored envelope
//!
//! A [`Document`] is the field-name → [`Value`] view of a record. On disk a
//! document is wrapped in an envelope tagged with its bucket name.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{AtlasError, Result};

use super::Value;

/// Envelope format version, bumped if the stored layout ever changes
const ENVELOPE_VERSION: u8 = 1;

/// The field view of one record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    fields: BTreeMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a field; absent fields read as `None`
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Field value with absent fields treated as `Value::Null`
    pub fn value(&self, field: &str) -> &Value {
        static NULL: Value = Value::Null;
        self.fields.get(field).unwrap_or(&NULL)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub(crate) fn into_fields(self) -> BTreeMap<String, Value> {
        self.fields
    }
}

impl FromIterator<(String, Value)> for Document {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        f.write_str("}")
    }
}

// =============================================================================
// Envelope
// =============================================================================

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u8,
    bucket: &'a str,
    document: &'a Document,
}

#[derive(Deserialize)]
struct Envelope {
    version: u8,
    bucket: String,
    document: Document,
}

/// Encode a document into its stored byte form
pub fn encode_document(bucket: &str, document: &Document) -> Result<Vec<u8>> {
    let envelope = EnvelopeRef {
        version: ENVELOPE_VERSION,
        bucket,
        document,
    };
    bincode::serialize(&envelope).map_err(|e| AtlasError::Encoding(e.to_string()))
}

/// Decode stored bytes, checking they belong to `bucket`
pub fn decode_document(bucket: &str, bytes: &[u8]) -> Result<Document> {
    let envelope: Envelope =
        bincode::deserialize(bytes).map_err(|e| AtlasError::Decoding(e.to_string()))?;

    if envelope.version != ENVELOPE_VERSION {
        return Err(AtlasError::Decoding(format!(
            "Unsupported record version: {}",
            envelope.version
        )));
    }

    if envelope.bucket != bucket {
        return Err(AtlasError::Decoding(format!(
            "Type tag mismatch: expected '{}', found '{}'",
            bucket, envelope.bucket
        )));
    }

    Ok(envelope.document)
}
