use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use strata_driver::StorageDriver;
use strata_types::{Digest, RepositoryName};
use tracing::debug;

use crate::error::StorageResult;
use crate::paths::{PathMapper, PathSpec};

/// Write-once soft-delete markers keyed by repository and digest.
///
/// The existence of the marker is the tombstone. Its content is the time it
/// was written, kept only for humans reading the storage tree. There is no
/// way to remove a tombstone through this type.
#[derive(Clone, Debug)]
pub struct Tombstones {
    driver: Arc<dyn StorageDriver>,
    paths: PathMapper,
}

impl Tombstones {
    /// Create a tombstone manager over `driver`.
    pub fn new(driver: Arc<dyn StorageDriver>, paths: PathMapper) -> Self {
        Self { driver, paths }
    }

    /// Whether `digest` is tombstoned in repository `name`.
    pub fn exists(&self, name: &RepositoryName, digest: &Digest) -> StorageResult<bool> {
        let path = self.paths.path(&PathSpec::Tombstone { name, digest })?;
        match self.driver.stat(&path) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Record a tombstone. Callers check [`Tombstones::exists`] first.
    pub fn put(&self, name: &RepositoryName, digest: &Digest) -> StorageResult<()> {
        let path = self.paths.path(&PathSpec::Tombstone { name, digest })?;
        let deleted_at = Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true);
        self.driver.put_content(&path, deleted_at.as_bytes())?;
        debug!(repository = %name, digest = %digest, "tombstone written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use strata_driver::{DriverError, DriverResult, FileInfo, InMemoryDriver};

    fn tombstones() -> Tombstones {
        Tombstones::new(Arc::new(InMemoryDriver::new()), PathMapper::default())
    }

    #[test]
    fn put_then_exists() {
        let tomb = tombstones();
        let name = RepositoryName::new("foo/bar").unwrap();
        let digest = Digest::from_bytes(b"gone");
        assert!(!tomb.exists(&name, &digest).unwrap());
        tomb.put(&name, &digest).unwrap();
        assert!(tomb.exists(&name, &digest).unwrap());
    }

    #[test]
    fn tombstones_are_scoped_to_repository() {
        let tomb = tombstones();
        let digest = Digest::from_bytes(b"shared");
        let a = RepositoryName::new("team/a").unwrap();
        let b = RepositoryName::new("team/b").unwrap();
        tomb.put(&a, &digest).unwrap();
        assert!(tomb.exists(&a, &digest).unwrap());
        assert!(!tomb.exists(&b, &digest).unwrap());
    }

    #[test]
    fn put_twice_is_harmless() {
        let tomb = tombstones();
        let name = RepositoryName::new("foo").unwrap();
        let digest = Digest::from_bytes(b"twice");
        tomb.put(&name, &digest).unwrap();
        tomb.put(&name, &digest).unwrap();
        assert!(tomb.exists(&name, &digest).unwrap());
    }

    /// Driver whose `stat` always fails with a non-not-found error.
    #[derive(Debug)]
    struct BrokenStat(InMemoryDriver);

    impl StorageDriver for BrokenStat {
        fn name(&self) -> &'static str {
            "broken"
        }
        fn get_content(&self, path: &str) -> DriverResult<Vec<u8>> {
            self.0.get_content(path)
        }
        fn put_content(&self, path: &str, content: &[u8]) -> DriverResult<()> {
            self.0.put_content(path, content)
        }
        fn read_stream(
            &self,
            path: &str,
            offset: u64,
        ) -> DriverResult<Box<dyn std::io::Read + Send>> {
            self.0.read_stream(path, offset)
        }
        fn write_stream(
            &self,
            path: &str,
            offset: u64,
            reader: &mut dyn std::io::Read,
        ) -> DriverResult<u64> {
            self.0.write_stream(path, offset, reader)
        }
        fn stat(&self, _path: &str) -> DriverResult<FileInfo> {
            Err(DriverError::Io(std::io::Error::other("disk on fire")))
        }
        fn list(&self, path: &str) -> DriverResult<Vec<String>> {
            self.0.list(path)
        }
        fn move_to(&self, source: &str, dest: &str) -> DriverResult<()> {
            self.0.move_to(source, dest)
        }
        fn delete(&self, path: &str) -> DriverResult<()> {
            self.0.delete(path)
        }
    }

    #[test]
    fn driver_errors_propagate_unchanged() {
        let tomb = Tombstones::new(
            Arc::new(BrokenStat(InMemoryDriver::new())),
            PathMapper::default(),
        );
        let name = RepositoryName::new("foo").unwrap();
        let err = tomb.exists(&name, &Digest::from_bytes(b"x")).unwrap_err();
        assert!(matches!(err, StorageError::Driver(DriverError::Io(_))));
    }
}
