//! Error types for StowDB core.

use crate::id::Identifier;
use stowdb_storage::StorageError;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in StowDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Engine error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Identifier text could not be parsed.
    #[error("malformed identifier {input:?}: {reason}")]
    MalformedIdentifier {
        /// The text that failed to parse.
        input: String,
        /// What was wrong with it.
        reason: String,
    },

    /// No registered type matches the name or id.
    #[error("type not found: {type_ref}")]
    TypeNotFound {
        /// The type name, or `id <n>` for lookups by id.
        type_ref: String,
    },

    /// A factory failed to produce a record of the expected type.
    #[error("could not create instance of {type_name}: {reason}")]
    TypeNotCreated {
        /// Type that was requested.
        type_name: String,
        /// Description of the failure.
        reason: String,
    },

    /// The type name is already registered.
    #[error("type already registered: {name}")]
    DuplicateType {
        /// The duplicated name.
        name: String,
    },

    /// The type name belongs to a registry meta-type.
    #[error("type name is reserved: {name}")]
    ReservedType {
        /// The reserved name.
        name: String,
    },

    /// A record without an identifier cannot be written.
    #[error("record of type {type_name} has no identifier")]
    RecordHasNoIdentifier {
        /// Type of the record.
        type_name: String,
    },

    /// A record without an identifier cannot be deleted.
    #[error("identifier is nil")]
    IdentifierIsNil,

    /// The bucket does not exist.
    #[error("bucket not found: {bucket}")]
    BucketNotFound {
        /// Bucket name.
        bucket: String,
    },

    /// The key does not exist in its bucket.
    #[error("key not found: {key}")]
    KeyNotFound {
        /// Key text.
        key: String,
    },

    /// A bucket could not be created.
    #[error("could not create bucket {bucket}: {source}")]
    BucketCreateFailed {
        /// Bucket name.
        bucket: String,
        /// Underlying engine error.
        source: StorageError,
    },

    /// Encoding a value failed.
    #[error("serialization failed: {message}")]
    SerializationFailed {
        /// Description of the failure.
        message: String,
    },

    /// Decoding a value failed.
    #[error("deserialization failed: {message}")]
    DeserializationFailed {
        /// Description of the failure.
        message: String,
    },

    /// A write inside a transaction failed.
    #[error("write failed: {source}")]
    WriteFailed {
        /// Underlying engine error.
        source: StorageError,
    },

    /// A unique index already maps the value to another record.
    #[error("unique index {index} already holds {existing} (writing {id})")]
    UniqueIndexViolation {
        /// Index bucket name.
        index: String,
        /// Identifier text already stored under the key.
        existing: String,
        /// Identifier of the record being written.
        id: Identifier,
    },

    /// A record was not of the requested Rust type.
    #[error("type mismatch: expected {expected}, found {actual}")]
    TypeMismatch {
        /// Requested type.
        expected: String,
        /// Stored record's type name.
        actual: String,
    },

    /// The operation exists in the API but has no implementation.
    #[error("not implemented: {operation}")]
    NotImplemented {
        /// Operation name.
        operation: &'static str,
    },

    /// Registry bootstrap failed; the registry refuses further work.
    #[error("registry bootstrap failed: {message}")]
    Bootstrap {
        /// Description of the original failure.
        message: String,
    },

    /// The store configuration cannot be satisfied.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates a malformed identifier error.
    pub fn malformed_identifier(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedIdentifier {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Creates a type-not-found error for a type name.
    pub fn type_not_found(name: impl Into<String>) -> Self {
        Self::TypeNotFound {
            type_ref: name.into(),
        }
    }

    /// Creates a type-not-found error for a type id.
    pub fn type_id_not_found(type_id: i64) -> Self {
        Self::TypeNotFound {
            type_ref: format!("id {type_id}"),
        }
    }

    /// Creates a type-not-created error.
    pub fn type_not_created(type_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TypeNotCreated {
            type_name: type_name.into(),
            reason: reason.into(),
        }
    }

    /// Creates a bucket-not-found error from raw bucket bytes.
    pub fn bucket_not_found(bucket: &[u8]) -> Self {
        Self::BucketNotFound {
            bucket: String::from_utf8_lossy(bucket).into_owned(),
        }
    }

    /// Creates a key-not-found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates a bucket-create error.
    pub fn bucket_create_failed(bucket: &[u8], source: StorageError) -> Self {
        Self::BucketCreateFailed {
            bucket: String::from_utf8_lossy(bucket).into_owned(),
            source,
        }
    }

    /// Creates a write-failed error.
    pub fn write_failed(source: StorageError) -> Self {
        Self::WriteFailed { source }
    }

    /// Creates a serialization error.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationFailed {
            message: message.into(),
        }
    }

    /// Creates a deserialization error.
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::DeserializationFailed {
            message: message.into(),
        }
    }

    /// Creates a bootstrap error.
    pub fn bootstrap(message: impl Into<String>) -> Self {
        Self::Bootstrap {
            message: message.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Returns true if the error reports a missing bucket or key.
    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::BucketNotFound { .. } | Self::KeyNotFound { .. })
    }
}


