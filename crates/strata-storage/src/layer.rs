use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use strata_driver::StorageDriver;
use strata_types::{Digest, UploadId};
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};
use crate::paths::PathSpec;
use crate::registry::Repository;
use crate::stream::FileReader;
use crate::tombstone::Tombstones;
use crate::upload::LayerUpload;

/// Layer operations for a single repository.
///
/// Every read-side operation consults the repository's tombstones before
/// anything else, then reaches blob content only through the repository's
/// link files. A digest is therefore, from this store's point of view,
/// either absent, tombstoned, or present with a resolvable link.
#[derive(Clone, Debug)]
pub struct LayerStore {
    repository: Repository,
    tombstones: Tombstones,
}

impl LayerStore {
    /// Create the layer store for one repository.
    pub fn new(repository: Repository) -> Self {
        let tombstones = Tombstones::new(repository.driver.clone(), repository.paths.clone());
        Self {
            repository,
            tombstones,
        }
    }

    /// The repository this store is scoped to.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// Whether the layer is readable from this repository.
    ///
    /// Tombstoned and unlinked digests both report `false`. A link whose
    /// blob content has gone missing is an error, not `false`.
    pub fn exists(&self, digest: &Digest) -> StorageResult<bool> {
        debug!(repository = %self.repository.name, digest = %digest, "layer exists");

        if self.tombstones.exists(&self.repository.name, digest)? {
            return Ok(false);
        }

        let blob_path = match self.path(digest) {
            Ok(path) => path,
            Err(StorageError::UnknownLayer { .. }) => return Ok(false),
            Err(e) => return Err(e),
        };

        self.repository.driver.stat(&blob_path)?;
        Ok(true)
    }

    /// Open a reader on the layer's content.
    pub fn fetch(&self, digest: &Digest) -> StorageResult<LayerReader> {
        debug!(repository = %self.repository.name, digest = %digest, "layer fetch");

        if !self.exists(digest)? {
            return Err(StorageError::UnknownLayer {
                digest: digest.clone(),
            });
        }

        let blob_path = self.path(digest)?;
        LayerReader::open(self.repository.driver.clone(), blob_path, digest.clone())
    }

    /// Start a new upload.
    ///
    /// Concurrent uploads that turn out to carry the same content are not
    /// serialized; whichever finishes first stores the blob.
    pub fn upload(&self) -> StorageResult<LayerUpload> {
        let id = UploadId::generate();
        let started_at = Utc::now();
        debug!(repository = %self.repository.name, upload = %id, "layer upload");

        let name = &self.repository.name;
        let data_path = self.repository.paths.path(&PathSpec::UploadData {
            name,
            id: id.as_str(),
        })?;
        let started_at_path = self.repository.paths.path(&PathSpec::UploadStartedAt {
            name,
            id: id.as_str(),
        })?;

        self.repository.driver.put_content(
            &started_at_path,
            started_at
                .to_rfc3339_opts(SecondsFormat::Nanos, true)
                .as_bytes(),
        )?;

        LayerUpload::new(self.repository.clone(), id, data_path, started_at)
    }

    /// Continue an upload started earlier, possibly by another process.
    pub fn resume(&self, id: &str) -> StorageResult<LayerUpload> {
        debug!(repository = %self.repository.name, upload = id, "layer resume");
        let id = UploadId::parse(id).map_err(|_| StorageError::UnknownUpload {
            id: id.to_string(),
        })?;

        let name = &self.repository.name;
        let started_at_path = self.repository.paths.path(&PathSpec::UploadStartedAt {
            name,
            id: id.as_str(),
        })?;

        let raw = match self.repository.driver.get_content(&started_at_path) {
            Ok(raw) => raw,
            Err(e) if e.is_not_found() => {
                return Err(StorageError::UnknownUpload { id: id.to_string() });
            }
            Err(e) => return Err(e.into()),
        };

        let value = String::from_utf8_lossy(&raw).into_owned();
        let started_at = match DateTime::parse_from_rfc3339(value.trim()) {
            Ok(t) => t.with_timezone(&Utc),
            Err(source) => {
                return Err(StorageError::MalformedTimestamp { id, value, source });
            }
        };

        let data_path = self.repository.paths.path(&PathSpec::UploadData {
            name,
            id: id.as_str(),
        })?;

        LayerUpload::new(self.repository.clone(), id, data_path, started_at)
    }

    /// Soft-delete a layer from this repository by writing a tombstone.
    ///
    /// Deleting an already deleted layer fails with `UnknownLayer`. Links and
    /// blob content are left in place.
    pub fn delete(&self, digest: &Digest) -> StorageResult<()> {
        debug!(repository = %self.repository.name, digest = %digest, "layer delete");

        if self.tombstones.exists(&self.repository.name, digest)? {
            return Err(StorageError::UnknownLayer {
                digest: digest.clone(),
            });
        }

        self.tombstones.put(&self.repository.name, digest)?;
        info!(repository = %self.repository.name, digest = %digest, "layer deleted");
        Ok(())
    }

    /// Blob path for `digest`, reached through this repository's link.
    fn path(&self, digest: &Digest) -> StorageResult<String> {
        let link_path = self.repository.paths.path(&PathSpec::LayerLink {
            name: &self.repository.name,
            digest,
        })?;

        match self.repository.blobs.resolve(&link_path) {
            Ok(path) => Ok(path),
            Err(e) if e.is_path_not_found() => Err(StorageError::UnknownLayer {
                digest: digest.clone(),
            }),
            Err(e) => Err(e),
        }
    }
}

/// Random-access reader over a layer, bound to the digest it was opened for.
#[derive(Debug)]
pub struct LayerReader {
    digest: Digest,
    reader: FileReader,
}

impl LayerReader {
    pub(crate) fn open(
        driver: Arc<dyn StorageDriver>,
        path: String,
        digest: Digest,
    ) -> StorageResult<Self> {
        Ok(Self {
            digest,
            reader: FileReader::open(driver, path)?,
        })
    }

    /// Digest of the layer being read.
    pub fn digest(&self) -> &Digest {
        &self.digest
    }

    /// Size of the layer in bytes.
    pub fn length(&self) -> u64 {
        self.reader.size()
    }

    /// Driver path of the underlying blob.
    pub fn path(&self) -> &str {
        self.reader.path()
    }
}

impl Read for LayerReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl Seek for LayerReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.reader.seek(pos)
    }
}
