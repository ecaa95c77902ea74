//! Content-addressed layer storage for Strata.
//!
//! Layers are blobs identified by their digest. Blob bytes are stored once
//! and shared by every repository, while ownership is per repository: a
//! repository can read a layer only through its own link file, and can hide
//! a layer from itself for good with a tombstone. Uploads are resumable
//! sessions that survive process restarts.
//!
//! # Architecture
//!
//! - [`PathMapper`] -- pure mapping from identifiers to driver paths
//! - [`BlobStore`] -- global blob content and link resolution
//! - [`Tombstones`] -- write-once soft-delete markers
//! - [`FileWriter`] / [`FileReader`] -- buffered streaming over driver paths
//! - [`LayerUpload`] -- one resumable upload session
//! - [`LayerStore`] -- exists, fetch, upload, resume and delete
//! - [`Registry`] / [`Repository`] -- configuration and repository scoping
//!
//! # Design Rules
//!
//! 1. Tombstones are checked before anything else and are never removed.
//! 2. Blob bytes, once committed under a digest, are never rewritten.
//! 3. No operation spans a transaction; the driver offers none.
//! 4. Driver "not found" is translated where it is observed; every other
//!    driver error passes through unchanged.

pub mod blobs;
pub mod config;
pub mod error;
pub mod layer;
pub mod paths;
pub mod registry;
pub mod stream;
pub mod tombstone;
pub mod upload;

pub use blobs::BlobStore;
pub use config::{DriverConfig, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use layer::{LayerReader, LayerStore};
pub use paths::{PathMapper, PathSpec};
pub use registry::{Registry, Repository};
pub use stream::{FileReader, FileWriter};
pub use tombstone::Tombstones;
pub use upload::LayerUpload;

#[cfg(test)]
pub(crate) fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};

    use strata_types::Digest;

    use super::*;

    fn filesystem_config(root: &std::path::Path) -> StorageConfig {
        StorageConfig {
            driver: DriverConfig::Filesystem {
                root: root.to_path_buf(),
            },
            ..StorageConfig::default()
        }
    }

    #[test]
    fn upload_survives_process_restart() {
        init_test_tracing();
        let dir = tempfile::tempdir().unwrap();
        let config = filesystem_config(dir.path());

        let (id, started_at) = {
            let registry = Registry::from_config(&config).unwrap();
            let layers = registry.repository("library/app").unwrap().layers();
            let mut upload = layers.upload().unwrap();
            upload.write_all(b"abc").unwrap();
            upload.flush().unwrap();
            (upload.id().clone(), upload.started_at())
        };

        let registry = Registry::from_config(&config).unwrap();
        let layers = registry.repository("library/app").unwrap().layers();
        let mut upload = layers.resume(id.as_str()).unwrap();
        assert_eq!(upload.started_at(), started_at);
        assert_eq!(upload.offset(), 3);
        upload.write_all(b"def").unwrap();

        let digest = Digest::from_bytes(b"abcdef");
        upload.finish(&digest).unwrap();

        let mut content = Vec::new();
        layers.fetch(&digest).unwrap().read_to_end(&mut content).unwrap();
        assert_eq!(content, b"abcdef");
    }

    #[test]
    fn delete_then_exists_on_disk() {
        init_test_tracing();
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::from_config(&filesystem_config(dir.path())).unwrap();
        let layers = registry.repository("library/app").unwrap().layers();

        let mut upload = layers.upload().unwrap();
        upload.write_all(b"soon gone").unwrap();
        let digest = Digest::from_bytes(b"soon gone");
        upload.finish(&digest).unwrap();
        assert!(layers.exists(&digest).unwrap());

        layers.delete(&digest).unwrap();
        assert!(!layers.exists(&digest).unwrap());
        assert!(matches!(
            layers.delete(&digest).unwrap_err(),
            StorageError::UnknownLayer { .. }
        ));
        assert!(registry.blobs().exists(&digest).unwrap());
    }
}
