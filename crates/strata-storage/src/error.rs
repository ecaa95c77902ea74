use strata_driver::DriverError;
use strata_types::{Digest, TypeError, UploadId};
use thiserror::Error;

/// Errors from layer storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The digest has no resolvable link in this repository, is tombstoned,
    /// or was already deleted.
    #[error("unknown layer: {digest}")]
    UnknownLayer { digest: Digest },

    /// No upload with this token has been started in this repository.
    /// Tokens that could never have been issued land here too.
    #[error("unknown upload: {id}")]
    UnknownUpload { id: String },

    /// The persisted start time of an upload could not be parsed.
    #[error("malformed start time {value:?} for upload {id}")]
    MalformedTimestamp {
        id: UploadId,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// Uploaded content does not hash to the digest it was committed under.
    #[error("digest mismatch: expected {expected}, computed {computed}")]
    DigestMismatch { expected: Digest, computed: Digest },

    /// A link file exists but does not name a valid digest.
    #[error("corrupt link at {path}: {reason}")]
    CorruptLink { path: String, reason: String },

    /// A repository name, digest or upload id failed validation.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] TypeError),

    /// Any other failure reported by the storage driver.
    #[error("driver error: {0}")]
    Driver(#[from] DriverError),

    /// I/O error while streaming content.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The storage configuration is invalid or could not be loaded.
    #[error("config error: {0}")]
    Config(String),
}

impl StorageError {
    /// Whether this is the driver reporting that nothing exists at a path.
    pub fn is_path_not_found(&self) -> bool {
        matches!(self, Self::Driver(e) if e.is_not_found())
    }
}

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
