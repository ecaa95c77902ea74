use std::fmt;
use std::io::{self, Read, Write};

use chrono::{DateTime, Utc};
use strata_driver::StorageDriver;
use strata_types::{Digest, Digester, UploadId};
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::layer::LayerReader;
use crate::paths::PathSpec;
use crate::registry::Repository;
use crate::stream::FileWriter;
use crate::tombstone::Tombstones;

/// One in-progress layer upload.
///
/// The session owns a buffered writer on the upload's data path and a
/// running digest of every byte written through it. When a session is
/// opened on a data path that already holds bytes (a resume), those bytes
/// are hashed once up front, so the digest always covers exactly
/// `0..offset()` with no gap and no byte counted twice.
pub struct LayerUpload {
    repository: Repository,
    id: UploadId,
    started_at: DateTime<Utc>,
    writer: FileWriter,
    digester: Digester,
    tombstones: Tombstones,
}

impl LayerUpload {
    pub(crate) fn new(
        repository: Repository,
        id: UploadId,
        data_path: String,
        started_at: DateTime<Utc>,
    ) -> StorageResult<Self> {
        let writer = FileWriter::open(
            repository.driver.clone(),
            data_path,
            repository.buffer_size,
        )?;

        let mut digester = Digester::canonical();
        let resumed_at = writer.offset();
        if resumed_at > 0 {
            hash_prefix(
                repository.driver.as_ref(),
                writer.path(),
                resumed_at,
                &mut digester,
            )?;
            debug!(upload = %id, offset = resumed_at, "rehashed existing upload data");
        }

        let tombstones = Tombstones::new(repository.driver.clone(), repository.paths.clone());

        Ok(Self {
            repository,
            id,
            started_at,
            writer,
            digester,
            tombstones,
        })
    }

    /// Token identifying this upload for later resumes.
    pub fn id(&self) -> &UploadId {
        &self.id
    }

    /// When the upload was first started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Number of bytes written so far, across all resumptions.
    pub fn offset(&self) -> u64 {
        self.writer.offset()
    }

    /// Digest of everything written so far.
    pub fn current_digest(&self) -> Digest {
        self.digester.digest()
    }

    /// Copy all of `reader` into the upload.
    pub fn read_from(&mut self, reader: &mut dyn Read) -> StorageResult<u64> {
        Ok(io::copy(reader, self)?)
    }

    /// Verify the content against `digest` and commit it as a layer of this
    /// repository.
    ///
    /// Blob bytes are moved into place only if no blob with this digest
    /// exists yet; when two uploads of the same content race, the first one
    /// to finish provides the bytes and the other just links them. A digest
    /// tombstoned in this repository cannot be committed again.
    pub fn finish(mut self, digest: &Digest) -> StorageResult<LayerReader> {
        debug!(repository = %self.repository.name, upload = %self.id, digest = %digest, "upload finish");

        self.writer.flush()?;
        let name = self.repository.name.clone();
        let driver = self.repository.driver.clone();

        if self.tombstones.exists(&name, digest)? {
            return Err(StorageError::UnknownLayer {
                digest: digest.clone(),
            });
        }

        let computed = self.verify_digest(digest)?;
        if computed != *digest {
            return Err(StorageError::DigestMismatch {
                expected: digest.clone(),
                computed,
            });
        }

        let blobs = &self.repository.blobs;
        let blob_path = blobs.path(digest)?;
        if blobs.exists(digest)? {
            debug!(digest = %digest, "blob already committed by another upload");
        } else if self.writer.offset() == 0 {
            driver.put_content(&blob_path, &[])?;
        } else {
            driver.move_to(self.writer.path(), &blob_path)?;
        }

        let link_path = self.repository.paths.path(&PathSpec::LayerLink {
            name: &name,
            digest,
        })?;
        blobs.link(&link_path, digest)?;

        let upload_dir = self.repository.paths.path(&PathSpec::Upload {
            name: &name,
            id: self.id.as_str(),
        })?;
        if let Err(e) = driver.delete(&upload_dir) {
            warn!(upload = %self.id, error = %e, "failed to remove finished upload");
        }

        info!(
            repository = %name,
            digest = %digest,
            size = self.writer.offset(),
            "layer committed"
        );
        LayerReader::open(driver, blob_path, digest.clone())
    }

    /// Abandon the upload and remove everything stored for it.
    pub fn cancel(self) -> StorageResult<()> {
        debug!(repository = %self.repository.name, upload = %self.id, "upload cancel");
        let upload_dir = self.repository.paths.path(&PathSpec::Upload {
            name: &self.repository.name,
            id: self.id.as_str(),
        })?;
        match self.repository.driver.delete(&upload_dir) {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Err(StorageError::UnknownUpload {
                id: self.id.to_string(),
            }),
            Err(e) => Err(e.into()),
        }
    }

    /// Digest of the written content under `digest`'s algorithm.
    fn verify_digest(&self, digest: &Digest) -> StorageResult<Digest> {
        if digest.algorithm() == self.digester.algorithm() {
            return Ok(self.digester.digest());
        }
        let mut digester = Digester::new(digest.algorithm());
        hash_prefix(
            self.repository.driver.as_ref(),
            self.writer.path(),
            self.writer.offset(),
            &mut digester,
        )?;
        Ok(digester.finish())
    }
}

/// Feed the first `len` bytes at `path` into `digester`.
fn hash_prefix(
    driver: &dyn StorageDriver,
    path: &str,
    len: u64,
    digester: &mut Digester,
) -> StorageResult<()> {
    if len == 0 {
        return Ok(());
    }
    let stream = driver.read_stream(path, 0)?;
    let copied = io::copy(&mut stream.take(len), digester)?;
    if copied != len {
        return Err(StorageError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {len} bytes at {path}, read {copied}"),
        )));
    }
    Ok(())
}

impl Write for LayerUpload {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.writer.write(buf)?;
        self.digester.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl fmt::Debug for LayerUpload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LayerUpload")
            .field("repository", &self.repository.name)
            .field("id", &self.id)
            .field("started_at", &self.started_at)
            .field("offset", &self.writer.offset())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageConfig;
    use crate::registry::Registry;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use strata_driver::{DriverError, DriverResult, FileInfo, InMemoryDriver};
    use strata_types::Algorithm;

    fn registry() -> Registry {
        crate::init_test_tracing();
        Registry::from_config(&StorageConfig::default()).unwrap()
    }

    fn read_all(mut reader: LayerReader) -> Vec<u8> {
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn resume_preserves_start_time_and_offset() {
        let registry = registry();
        let layers = registry.repository("foo/bar").unwrap().layers();

        let mut upload = layers.upload().unwrap();
        let id = upload.id().clone();
        let started_at = upload.started_at();
        upload.write_all(b"abc").unwrap();
        upload.flush().unwrap();
        drop(upload);

        let mut resumed = layers.resume(id.as_str()).unwrap();
        assert_eq!(resumed.id(), &id);
        assert_eq!(resumed.started_at(), started_at);
        assert_eq!(resumed.offset(), 3);
        assert_eq!(resumed.current_digest(), Digest::from_bytes(b"abc"));

        resumed.write_all(b"def").unwrap();
        let digest = Digest::from_bytes(b"abcdef");
        let reader = resumed.finish(&digest).unwrap();
        assert_eq!(reader.digest(), &digest);
        assert_eq!(read_all(reader), b"abcdef");
    }

    #[test]
    fn unflushed_bytes_do_not_survive_a_crash() {
        let registry = registry();
        let layers = registry.repository("foo/bar").unwrap().layers();

        let mut upload = layers.upload().unwrap();
        upload.write_all(b"abc").unwrap();
        upload.flush().unwrap();
        upload.write_all(b"lost").unwrap();
        let id = upload.id().clone();
        drop(upload);

        let resumed = layers.resume(id.as_str()).unwrap();
        assert_eq!(resumed.offset(), 3);
        assert_eq!(resumed.current_digest(), Digest::from_bytes(b"abc"));
    }

    #[test]
    fn read_from_copies_everything() {
        let registry = registry();
        let layers = registry.repository("foo/bar").unwrap().layers();
        let content = vec![7u8; 10_000];

        let mut upload = layers.upload().unwrap();
        let n = upload.read_from(&mut content.as_slice()).unwrap();
        assert_eq!(n, 10_000);
        assert_eq!(upload.offset(), 10_000);

        let digest = Digest::from_bytes(&content);
        upload.finish(&digest).unwrap();
        assert!(layers.exists(&digest).unwrap());
    }

    #[test]
    fn finish_rejects_wrong_digest() {
        let registry = registry();
        let layers = registry.repository("foo/bar").unwrap().layers();
        let mut upload = layers.upload().unwrap();
        upload.write_all(b"actual").unwrap();

        let claimed = Digest::from_bytes(b"claimed");
        match upload.finish(&claimed).unwrap_err() {
            StorageError::DigestMismatch { expected, computed } => {
                assert_eq!(expected, claimed);
                assert_eq!(computed, Digest::from_bytes(b"actual"));
            }
            other => panic!("expected DigestMismatch, got {other:?}"),
        }
        assert!(!layers.exists(&claimed).unwrap());
    }

    #[test]
    fn finish_with_non_canonical_algorithm() {
        let registry = registry();
        let layers = registry.repository("foo/bar").unwrap().layers();
        let mut upload = layers.upload().unwrap();
        upload.write_all(b"blake content").unwrap();

        let digest = Digest::compute(Algorithm::Blake3, b"blake content");
        let reader = upload.finish(&digest).unwrap();
        assert_eq!(read_all(reader), b"blake content");
        assert!(layers.exists(&digest).unwrap());
    }

    #[test]
    fn finish_empty_upload() {
        let registry = registry();
        let layers = registry.repository("foo/bar").unwrap().layers();
        let upload = layers.upload().unwrap();
        let digest = Digest::from_bytes(b"");
        let reader = upload.finish(&digest).unwrap();
        assert_eq!(reader.length(), 0);
        assert!(layers.exists(&digest).unwrap());
    }

    #[test]
    fn finished_upload_cannot_be_resumed() {
        let registry = registry();
        let layers = registry.repository("foo/bar").unwrap().layers();
        let mut upload = layers.upload().unwrap();
        let id = upload.id().clone();
        upload.write_all(b"done").unwrap();
        upload.finish(&Digest::from_bytes(b"done")).unwrap();

        assert!(matches!(
            layers.resume(id.as_str()).unwrap_err(),
            StorageError::UnknownUpload { .. }
        ));
    }

    #[test]
    fn concurrent_uploads_of_same_content_share_one_blob() {
        let registry = registry();
        let a = registry.repository("team/a").unwrap().layers();
        let b = registry.repository("team/b").unwrap().layers();
        let digest = Digest::from_bytes(b"same bytes");

        let mut first = a.upload().unwrap();
        let mut second = b.upload().unwrap();
        first.write_all(b"same bytes").unwrap();
        second.write_all(b"same bytes").unwrap();

        first.finish(&digest).unwrap();
        let reader = second.finish(&digest).unwrap();
        assert_eq!(read_all(reader), b"same bytes");

        assert!(a.exists(&digest).unwrap());
        assert!(b.exists(&digest).unwrap());
        let blob_dir = registry.paths().path(&PathSpec::BlobData { digest: &digest }).unwrap();
        assert!(registry.driver().stat(&blob_dir).is_ok());
    }

    #[test]
    fn tombstoned_digest_cannot_be_recommitted() {
        let registry = registry();
        let layers = registry.repository("foo/bar").unwrap().layers();
        let digest = Digest::from_bytes(b"deleted");
        layers.delete(&digest).unwrap();

        let mut upload = layers.upload().unwrap();
        upload.write_all(b"deleted").unwrap();
        assert!(matches!(
            upload.finish(&digest).unwrap_err(),
            StorageError::UnknownLayer { .. }
        ));
        assert!(!layers.exists(&digest).unwrap());
    }

    #[test]
    fn cancel_removes_the_session() {
        let registry = registry();
        let layers = registry.repository("foo/bar").unwrap().layers();
        let mut upload = layers.upload().unwrap();
        let id = upload.id().clone();
        upload.write_all(b"partial").unwrap();
        upload.flush().unwrap();

        upload.cancel().unwrap();
        assert!(matches!(
            layers.resume(id.as_str()).unwrap_err(),
            StorageError::UnknownUpload { .. }
        ));
    }

    #[test]
    fn small_buffer_keeps_hash_continuity() {
        let config = StorageConfig {
            buffer_size: 2,
            ..StorageConfig::default()
        };
        let registry = Registry::from_config(&config).unwrap();
        let layers = registry.repository("foo/bar").unwrap().layers();

        let mut upload = layers.upload().unwrap();
        let id = upload.id().clone();
        upload.write_all(b"hello ").unwrap();
        upload.flush().unwrap();
        drop(upload);

        for chunk in [&b"wor"[..], b"ld"] {
            let mut resumed = layers.resume(id.as_str()).unwrap();
            resumed.write_all(chunk).unwrap();
            resumed.flush().unwrap();
        }

        let resumed = layers.resume(id.as_str()).unwrap();
        assert_eq!(resumed.offset(), 11);
        let reader = resumed.finish(&Digest::from_bytes(b"hello world")).unwrap();
        assert_eq!(read_all(reader), b"hello world");
    }

    /// Driver whose first `write_stream` fails without writing anything.
    #[derive(Debug, Default)]
    struct FailFirstWrite {
        inner: InMemoryDriver,
        failed: AtomicBool,
    }

    impl StorageDriver for FailFirstWrite {
        fn name(&self) -> &'static str {
            "fail-first-write"
        }
        fn get_content(&self, path: &str) -> DriverResult<Vec<u8>> {
            self.inner.get_content(path)
        }
        fn put_content(&self, path: &str, content: &[u8]) -> DriverResult<()> {
            self.inner.put_content(path, content)
        }
        fn read_stream(&self, path: &str, offset: u64) -> DriverResult<Box<dyn Read + Send>> {
            self.inner.read_stream(path, offset)
        }
        fn write_stream(
            &self,
            path: &str,
            offset: u64,
            reader: &mut dyn Read,
        ) -> DriverResult<u64> {
            if !self.failed.swap(true, Ordering::SeqCst) {
                return Err(DriverError::Io(io::Error::other("transient")));
            }
            self.inner.write_stream(path, offset, reader)
        }
        fn stat(&self, path: &str) -> DriverResult<FileInfo> {
            self.inner.stat(path)
        }
        fn list(&self, path: &str) -> DriverResult<Vec<String>> {
            self.inner.list(path)
        }
        fn move_to(&self, source: &str, dest: &str) -> DriverResult<()> {
            self.inner.move_to(source, dest)
        }
        fn delete(&self, path: &str) -> DriverResult<()> {
            self.inner.delete(path)
        }
    }

    #[test]
    fn failed_write_is_neither_stored_nor_hashed() {
        crate::init_test_tracing();
        let config = StorageConfig {
            buffer_size: 2,
            ..StorageConfig::default()
        };
        let registry = Registry::new(Arc::new(FailFirstWrite::default()), &config).unwrap();
        let layers = registry.repository("foo/bar").unwrap().layers();

        let mut upload = layers.upload().unwrap();
        assert!(upload.write(b"abc").is_err());
        assert_eq!(upload.offset(), 0);
        assert_eq!(upload.current_digest(), Digest::from_bytes(b""));

        upload.write_all(b"abc").unwrap();
        assert_eq!(upload.offset(), 3);
        let digest = Digest::from_bytes(b"abc");
        let reader = upload.finish(&digest).unwrap();
        assert_eq!(read_all(reader), b"abc");
    }
}
