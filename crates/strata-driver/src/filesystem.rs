use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{DriverError, DriverResult};
use crate::traits::{validate_path, FileInfo, StorageDriver};

/// Storage driver backed by a directory on the local filesystem.
///
/// Driver path `/a/b/c` maps to `<root>/a/b/c`. Whole-object puts go through
/// a temporary file in the target directory and are renamed into place, so
/// readers never observe a partially written object.
#[derive(Debug)]
pub struct FilesystemDriver {
    root: PathBuf,
}

impl FilesystemDriver {
    /// Create a driver rooted at `root`, creating the directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> DriverResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        debug!(root = %root.display(), "filesystem driver ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &str) -> DriverResult<PathBuf> {
        validate_path(path)?;
        Ok(self.root.join(path.trim_start_matches('/')))
    }
}

/// Translate "no such file" into the driver's not-found kind.
fn map_io(path: &str, err: io::Error) -> DriverError {
    if err.kind() == io::ErrorKind::NotFound {
        DriverError::not_found(path)
    } else {
        DriverError::Io(err)
    }
}

fn ensure_parent(full: &Path) -> DriverResult<()> {
    if let Some(parent) = full.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

impl StorageDriver for FilesystemDriver {
    fn name(&self) -> &'static str {
        "filesystem"
    }

    fn get_content(&self, path: &str) -> DriverResult<Vec<u8>> {
        let full = self.full_path(path)?;
        fs::read(&full).map_err(|e| map_io(path, e))
    }

    fn put_content(&self, path: &str, content: &[u8]) -> DriverResult<()> {
        let full = self.full_path(path)?;
        ensure_parent(&full)?;
        let dir = full.parent().unwrap_or(self.root.as_path());
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(content)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&full).map_err(|e| DriverError::Io(e.error))?;
        Ok(())
    }

    fn read_stream(&self, path: &str, offset: u64) -> DriverResult<Box<dyn Read + Send>> {
        let full = self.full_path(path)?;
        let mut file = File::open(&full).map_err(|e| map_io(path, e))?;
        let len = file.metadata()?.len();
        if offset > len {
            return Err(DriverError::InvalidOffset {
                path: path.to_string(),
                offset,
            });
        }
        file.seek(SeekFrom::Start(offset))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn write_stream(&self, path: &str, offset: u64, reader: &mut dyn Read) -> DriverResult<u64> {
        let full = self.full_path(path)?;
        let current_len = match fs::metadata(&full) {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(e.into()),
        };
        if offset > current_len {
            return Err(DriverError::InvalidOffset {
                path: path.to_string(),
                offset,
            });
        }

        ensure_parent(&full)?;
        let mut file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&full)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut writer = BufWriter::new(file);
        let written = io::copy(reader, &mut writer)?;
        writer.flush()?;
        Ok(written)
    }

    fn stat(&self, path: &str) -> DriverResult<FileInfo> {
        let full = self.full_path(path)?;
        let meta = fs::metadata(&full).map_err(|e| map_io(path, e))?;
        let mod_time: DateTime<Utc> = meta.modified()?.into();
        Ok(FileInfo {
            path: path.to_string(),
            size: if meta.is_dir() { 0 } else { meta.len() },
            mod_time,
            is_dir: meta.is_dir(),
        })
    }

    fn list(&self, path: &str) -> DriverResult<Vec<String>> {
        let full = self.full_path(path)?;
        let base = path.trim_end_matches('/');
        let mut children = Vec::new();
        for entry in fs::read_dir(&full).map_err(|e| map_io(path, e))? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            // Leftover temporaries from interrupted puts are not content.
            if name.starts_with(".tmp") {
                continue;
            }
            children.push(format!("{base}/{name}"));
        }
        children.sort();
        Ok(children)
    }

    fn move_to(&self, source: &str, dest: &str) -> DriverResult<()> {
        let from = self.full_path(source)?;
        let to = self.full_path(dest)?;
        if !from.exists() {
            return Err(DriverError::not_found(source));
        }
        ensure_parent(&to)?;
        fs::rename(&from, &to).map_err(|e| map_io(source, e))
    }

    fn delete(&self, path: &str) -> DriverResult<()> {
        let full = self.full_path(path)?;
        let meta = fs::metadata(&full).map_err(|e| map_io(path, e))?;
        if meta.is_dir() {
            fs::remove_dir_all(&full)?;
        } else {
            fs::remove_file(&full)?;
        }
        Ok(())
    }
}
