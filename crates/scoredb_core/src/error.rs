//! Error types for scoredb core.

use crate::keys::Key;
use crate::score::Score;
use std::io;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in scoredb core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] scoredb_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The requested score has no index entry.
    #[error("unknown score {score}")]
    NotFound {
        /// The score that was looked up.
        score: Score,
    },

    /// The requested key has no mapping.
    #[error("unknown key {key}")]
    KeyNotFound {
        /// The key that was looked up.
        key: Key,
    },

    /// Bytes read back do not hash to the requested score.
    #[error("checksum failure: expected {expected}, got {actual}")]
    ChecksumFailure {
        /// The requested score.
        expected: Score,
        /// The score of the bytes actually read.
        actual: Score,
    },

    /// Scanning the data log failed for a reason other than a torn tail.
    #[error("index rebuild failed at offset {offset}: {message}")]
    Rebuild {
        /// Data log offset of the block being decoded.
        offset: u64,
        /// Description of the failure.
        message: String,
    },

    /// An on-disk record is malformed.
    #[error("corruption: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },

    /// A payload position or size does not fit the 32-bit index fields.
    #[error("address {position} exceeds the 4 GiB index range")]
    AddressOverflow {
        /// The offending position or end offset.
        position: u64,
    },

    /// Operation not permitted in the current store state.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of why the operation is invalid.
        message: String,
    },

    /// A payload transform (compression, encryption) failed.
    #[error("transform failed: {message}")]
    Transform {
        /// Description of the failure.
        message: String,
    },

    /// Invalid key size.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Expected size in bytes.
        expected: usize,
        /// Actual size in bytes.
        actual: usize,
    },

    /// The transactional engine reported a failure.
    #[error("backend error: {message}")]
    Backend {
        /// Description of the failure.
        message: String,
    },
}

impl CoreError {
    /// Creates a rebuild error.
    pub fn rebuild(offset: u64, message: impl Into<String>) -> Self {
        Self::Rebuild {
            offset,
            message: message.into(),
        }
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Creates an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Creates a transform error.
    pub fn transform(message: impl Into<String>) -> Self {
        Self::Transform {
            message: message.into(),
        }
    }

    /// Creates a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// Creates an invalid key size error.
    pub fn invalid_key_size(actual: usize, expected: usize) -> Self {
        Self::InvalidKeySize { expected, actual }
    }

    /// Returns `true` for lookups of unknown scores or keys.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::KeyNotFound { .. })
    }
}
