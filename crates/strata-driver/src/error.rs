use thiserror::Error;

/// Errors from storage driver operations.
#[derive(Debug, Error)]
pub enum DriverError {
    /// Nothing is stored at the path. Callers translate this into their own
    /// domain errors.
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    /// The path is not a well-formed driver path.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A stream was requested past the end of the stored content.
    #[error("invalid offset {offset} for {path}")]
    InvalidOffset { path: String, offset: u64 },

    /// I/O error from the underlying backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DriverError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound { .. })
    }

    pub(crate) fn not_found(path: &str) -> Self {
        Self::PathNotFound {
            path: path.to_string(),
        }
    }
}

/// Result alias for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;
