//! Mapping from semantic identifiers to driver paths.
//!
//! The layout below the configured root looks like this:
//!
//! ```text
//! <root>/<version>/
//! ├── blobs/<alg>/<hex[0..2]>/<hex>/data
//! └── repositories/<name>/
//!     ├── _layers/<alg>/<hex>/link
//!     ├── _tombstones/<alg>/<hex>/tombstone
//!     └── _uploads/<id>/
//!         ├── data
//!         └── startedat
//! ```
//!
//! Blob data is global and deduplicated; everything under `repositories/`
//! is scoped to one repository. A repository can only reach a blob through
//! its own link file.

use strata_types::{Digest, RepositoryName, UploadId};

use crate::config::StorageConfig;
use crate::error::StorageResult;

/// Identifies one logical object whose driver path is wanted.
#[derive(Clone, Copy, Debug)]
pub enum PathSpec<'a> {
    /// Canonical content of a blob, shared by all repositories.
    BlobData { digest: &'a Digest },
    /// Per-repository link granting access to a blob.
    LayerLink {
        name: &'a RepositoryName,
        digest: &'a Digest,
    },
    /// Soft-delete marker for a digest in one repository.
    Tombstone {
        name: &'a RepositoryName,
        digest: &'a Digest,
    },
    /// Directory holding all state of one upload.
    Upload { name: &'a RepositoryName, id: &'a str },
    /// Partially written content of an upload.
    UploadData { name: &'a RepositoryName, id: &'a str },
    /// Start time marker of an upload.
    UploadStartedAt { name: &'a RepositoryName, id: &'a str },
}

/// Pure, deterministic mapping from [`PathSpec`] to driver paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PathMapper {
    base: String,
}

impl PathMapper {
    /// Create a mapper rooted at `root` for layout `version`.
    pub fn new(root: &str, version: &str) -> Self {
        Self {
            base: format!("{}/{version}", root.trim_end_matches('/')),
        }
    }

    /// Create a mapper from the storage configuration.
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.root_directory, &config.layout_version)
    }

    /// Driver path for `spec`.
    ///
    /// Only fails when an upload id is not a valid token.
    pub fn path(&self, spec: &PathSpec<'_>) -> StorageResult<String> {
        let path = match *spec {
            PathSpec::BlobData { digest } => {
                let hex = digest.hex();
                format!(
                    "{}/blobs/{}/{}/{hex}/data",
                    self.base,
                    digest.algorithm(),
                    &hex[..2]
                )
            }
            PathSpec::LayerLink { name, digest } => format!(
                "{}/_layers/{}/{}/link",
                self.repository(name),
                digest.algorithm(),
                digest.hex()
            ),
            PathSpec::Tombstone { name, digest } => format!(
                "{}/_tombstones/{}/{}/tombstone",
                self.repository(name),
                digest.algorithm(),
                digest.hex()
            ),
            PathSpec::Upload { name, id } => self.upload(name, id)?,
            PathSpec::UploadData { name, id } => format!("{}/data", self.upload(name, id)?),
            PathSpec::UploadStartedAt { name, id } => {
                format!("{}/startedat", self.upload(name, id)?)
            }
        };
        Ok(path)
    }

    fn repository(&self, name: &RepositoryName) -> String {
        format!("{}/repositories/{name}", self.base)
    }

    fn upload(&self, name: &RepositoryName, id: &str) -> StorageResult<String> {
        let id = UploadId::parse(id)?;
        Ok(format!("{}/_uploads/{id}", self.repository(name)))
    }
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}
