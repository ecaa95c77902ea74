use std::sync::Arc;

use strata_driver::StorageDriver;
use strata_types::Digest;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::paths::{PathMapper, PathSpec};

/// Global, deduplicated blob content addressed by digest.
///
/// The blob store never decides who may read a blob. Access goes through
/// per-repository link files, which [`BlobStore::resolve`] follows.
#[derive(Clone, Debug)]
pub struct BlobStore {
    driver: Arc<dyn StorageDriver>,
    paths: PathMapper,
}

impl BlobStore {
    /// Create a blob store over `driver` using the given path layout.
    pub fn new(driver: Arc<dyn StorageDriver>, paths: PathMapper) -> Self {
        Self { driver, paths }
    }

    /// Driver path of a blob's content.
    pub fn path(&self, digest: &Digest) -> StorageResult<String> {
        self.paths.path(&PathSpec::BlobData { digest })
    }

    /// Whether content for `digest` is present, regardless of any links.
    pub fn exists(&self, digest: &Digest) -> StorageResult<bool> {
        match self.driver.stat(&self.path(digest)?) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Follow a link file to the blob path it names.
    ///
    /// A missing link surfaces as the driver's not-found error so callers can
    /// tell it apart from a link whose content is unreadable.
    pub fn resolve(&self, link_path: &str) -> StorageResult<String> {
        let content = self.driver.get_content(link_path)?;
        let text = std::str::from_utf8(&content).map_err(|e| StorageError::CorruptLink {
            path: link_path.to_string(),
            reason: e.to_string(),
        })?;
        let digest = Digest::parse(text.trim()).map_err(|e| StorageError::CorruptLink {
            path: link_path.to_string(),
            reason: e.to_string(),
        })?;
        self.path(&digest)
    }

    /// Write a link file pointing at `digest`.
    pub fn link(&self, link_path: &str, digest: &Digest) -> StorageResult<()> {
        self.driver
            .put_content(link_path, digest.to_string().as_bytes())?;
        Ok(())
    }

    /// Store `content` under its canonical digest. A no-op for content
    /// already present.
    pub fn put(&self, content: &[u8]) -> StorageResult<Digest> {
        let digest = Digest::from_bytes(content);
        if self.exists(&digest)? {
            debug!(digest = %digest, "blob already present");
            return Ok(digest);
        }
        self.driver.put_content(&self.path(&digest)?, content)?;
        debug!(digest = %digest, size = content.len(), "blob stored");
        Ok(digest)
    }

    /// Whole content of a blob.
    pub fn get(&self, digest: &Digest) -> StorageResult<Vec<u8>> {
        Ok(self.driver.get_content(&self.path(digest)?)?)
    }
}
