//! Error types for AtlasDB
//!
//! Provides a unified error type for all operations.

use std::fmt::Display;

use thiserror::Error;

/// Result type alias using AtlasError
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Unified error type for AtlasDB operations
#[derive(Debug, Error)]
pub enum AtlasError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store file corrupted: {0}")]
    Corruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("Decoding error: {0}")]
    Decoding(String),

    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    #[error("Key {key} not found in bucket '{bucket}'")]
    KeyNotFound { bucket: String, key: u64 },

    #[error("Not found: {0}")]
    NotFound(String),

    // -------------------------------------------------------------------------
    // Schema Errors
    // -------------------------------------------------------------------------
    #[error("Unknown bucket '{0}': no schema registered")]
    UnknownBucket(String),

    #[error("Missing primary key: {0}")]
    MissingKey(String),

    #[error("Unique index violation on '{bucket}.{field}'")]
    UniqueViolation { bucket: String, field: String },

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    // -------------------------------------------------------------------------
    // Concurrency Errors
    // -------------------------------------------------------------------------
    #[error("Store locked: {0}")]
    Locked(String),
}

/// Coarse classification of an [`AtlasError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A record could not be turned into bytes
    Encoding,
    /// Stored bytes are malformed or do not fit the requested type
    Decoding,
    /// The requested key or query result does not exist
    NotFound,
    /// The backing file could not be read, written or trusted
    StorageIo,
    /// The store file is owned by another handle
    Concurrency,
    /// The request itself is invalid (schema, key, constraint, config)
    Invalid,
}

impl AtlasError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            AtlasError::Io(_) | AtlasError::Corruption(_) | AtlasError::Storage(_) => {
                ErrorKind::StorageIo
            }
            AtlasError::Encoding(_) => ErrorKind::Encoding,
            AtlasError::Decoding(_) => ErrorKind::Decoding,
            AtlasError::KeyNotFound { .. } | AtlasError::NotFound(_) => ErrorKind::NotFound,
            AtlasError::Locked(_) => ErrorKind::Concurrency,
            AtlasError::UnknownBucket(_)
            | AtlasError::MissingKey(_)
            | AtlasError::UniqueViolation { .. }
            | AtlasError::Config(_) => ErrorKind::Invalid,
        }
    }

    /// True for both key lookups and query lookups that found nothing
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

// =============================================================================
// Serde integration (codec errors propagate through serde with `?`)
// =============================================================================

impl serde::ser::Error for AtlasError {
    fn custom<T: Display>(msg: T) -> Self {
        AtlasError::Encoding(msg.to_string())
    }
}

impl serde::de::Error for AtlasError {
    fn custom<T: Display>(msg: T) -> Self {
        AtlasError::Decoding(msg.to_string())
    }
}
