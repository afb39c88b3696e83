//! Error types for the storage engine.

use std::io;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur in the storage engine or its backends.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The commit log is corrupted.
    #[error("commit log corrupted at offset {offset}: {message}")]
    Corrupted {
        /// Byte offset of the offending record.
        offset: u64,
        /// Description of the corruption.
        message: String,
    },

    /// A write targeted a bucket that does not exist.
    #[error("bucket not found: {name}")]
    BucketNotFound {
        /// Lossy UTF-8 rendering of the bucket name.
        name: String,
    },

    /// Bucket names must be non-empty.
    #[error("invalid bucket name")]
    InvalidBucketName,

    /// Another process holds the lock on the store file.
    #[error("store file is locked by another process: {path}")]
    Locked {
        /// Path of the locked file.
        path: String,
    },

    /// A single value or commit exceeded the log framing limits.
    #[error("commit too large: {len} bytes")]
    TooLarge {
        /// Offending length in bytes.
        len: usize,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(offset: u64, message: impl Into<String>) -> Self {
        Self::Corrupted {
            offset,
            message: message.into(),
        }
    }

    /// Creates a bucket-not-found error from raw bucket bytes.
    pub fn bucket_not_found(name: &[u8]) -> Self {
        Self::BucketNotFound {
            name: String::from_utf8_lossy(name).into_owned(),
        }
    }
}
