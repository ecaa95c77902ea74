use std::fmt;
use std::io::Read;

use chrono::{DateTime, Utc};

use crate::error::{DriverError, DriverResult};

/// Metadata about a stored path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileInfo {
    pub path: String,
    /// Content length in bytes. Zero for directories.
    pub size: u64,
    pub mod_time: DateTime<Utc>,
    pub is_dir: bool,
}

/// Path-addressed storage backend.
///
/// All implementations must satisfy these invariants:
/// - Every call is blocking and self-contained; no call spans another.
/// - "Nothing here" is always reported as [`DriverError::PathNotFound`],
///   never as a generic I/O error, so callers can map it to domain errors.
/// - Directories are implicit: a path is a directory when some stored path
///   lives beneath it.
/// - Paths are checked with [`validate_path`] before any I/O.
pub trait StorageDriver: Send + Sync + fmt::Debug {
    /// Short backend name, for logs.
    fn name(&self) -> &'static str;

    /// Read the whole content stored at `path`.
    fn get_content(&self, path: &str) -> DriverResult<Vec<u8>>;

    /// Store `content` at `path`, replacing anything already there.
    fn put_content(&self, path: &str, content: &[u8]) -> DriverResult<()>;

    /// Open a reader positioned `offset` bytes into the content at `path`.
    ///
    /// An offset equal to the content length yields an empty reader; a larger
    /// one fails with [`DriverError::InvalidOffset`].
    fn read_stream(&self, path: &str, offset: u64) -> DriverResult<Box<dyn Read + Send>>;

    /// Copy `reader` into the content at `path`, starting at `offset`.
    ///
    /// Creates the path if missing. `offset` may not exceed the current
    /// length (no holes). Existing bytes past the written range are kept.
    /// Returns the number of bytes written.
    fn write_stream(&self, path: &str, offset: u64, reader: &mut dyn Read) -> DriverResult<u64>;

    /// Metadata for a file or implicit directory.
    fn stat(&self, path: &str) -> DriverResult<FileInfo>;

    /// Sorted full paths of the direct children of a directory.
    fn list(&self, path: &str) -> DriverResult<Vec<String>>;

    /// Move the content at `source` to `dest`, replacing `dest` if present.
    fn move_to(&self, source: &str, dest: &str) -> DriverResult<()>;

    /// Delete a file, or a directory and everything beneath it.
    fn delete(&self, path: &str) -> DriverResult<()>;
}

/// Check that `path` is a well-formed driver path.
pub fn validate_path(path: &str) -> DriverResult<()> {
    let invalid = |reason: &str| DriverError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    };

    let rest = path
        .strip_prefix('/')
        .ok_or_else(|| invalid("path must be absolute"))?;
    if rest.is_empty() {
        return Ok(());
    }
    for component in rest.split('/') {
        if component.is_empty() {
            return Err(invalid("empty path component"));
        }
        if component == "." || component == ".." {
            return Err(invalid("relative path component"));
        }
        if !component
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b':' | b'-'))
        {
            return Err(invalid("forbidden character"));
        }
    }
    Ok(())
}
