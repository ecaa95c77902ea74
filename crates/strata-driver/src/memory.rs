use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Read};
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::{DriverError, DriverResult};
use crate::traits::{validate_path, FileInfo, StorageDriver};

#[derive(Clone)]
struct Entry {
    data: Vec<u8>,
    mod_time: DateTime<Utc>,
}

impl Entry {
    fn new(data: Vec<u8>) -> Self {
        Self {
            data,
            mod_time: Utc::now(),
        }
    }
}

/// In-memory, map-based storage driver.
///
/// Intended for tests and embedding. Files are kept in a sorted map keyed by
/// full path behind a `RwLock`; directories exist only as shared prefixes.
pub struct InMemoryDriver {
    files: RwLock<BTreeMap<String, Entry>>,
}

impl InMemoryDriver {
    pub fn new() -> Self {
        Self {
            files: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of files currently stored.
    pub fn len(&self) -> usize {
        self.files.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.read().expect("lock poisoned").is_empty()
    }

    /// All stored file paths, sorted.
    pub fn paths(&self) -> Vec<String> {
        self.files
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for InMemoryDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn dir_prefix(path: &str) -> String {
    if path == "/" {
        path.to_string()
    } else {
        format!("{path}/")
    }
}

fn has_children(files: &BTreeMap<String, Entry>, path: &str) -> bool {
    let prefix = dir_prefix(path);
    files
        .range(prefix.clone()..)
        .next()
        .is_some_and(|(k, _)| k.starts_with(&prefix))
}

impl StorageDriver for InMemoryDriver {
    fn name(&self) -> &'static str {
        "inmemory"
    }

    fn get_content(&self, path: &str) -> DriverResult<Vec<u8>> {
        validate_path(path)?;
        let files = self.files.read().expect("lock poisoned");
        files
            .get(path)
            .map(|e| e.data.clone())
            .ok_or_else(|| DriverError::not_found(path))
    }

    fn put_content(&self, path: &str, content: &[u8]) -> DriverResult<()> {
        validate_path(path)?;
        let mut files = self.files.write().expect("lock poisoned");
        files.insert(path.to_string(), Entry::new(content.to_vec()));
        Ok(())
    }

    fn read_stream(&self, path: &str, offset: u64) -> DriverResult<Box<dyn Read + Send>> {
        validate_path(path)?;
        let files = self.files.read().expect("lock poisoned");
        let entry = files.get(path).ok_or_else(|| DriverError::not_found(path))?;
        if offset > entry.data.len() as u64 {
            return Err(DriverError::InvalidOffset {
                path: path.to_string(),
                offset,
            });
        }
        let tail = entry.data[offset as usize..].to_vec();
        Ok(Box::new(io::Cursor::new(tail)))
    }

    fn write_stream(&self, path: &str, offset: u64, reader: &mut dyn Read) -> DriverResult<u64> {
        validate_path(path)?;
        let mut incoming = Vec::new();
        reader.read_to_end(&mut incoming)?;

        let mut files = self.files.write().expect("lock poisoned");
        let current_len = files.get(path).map_or(0, |e| e.data.len() as u64);
        if offset > current_len {
            return Err(DriverError::InvalidOffset {
                path: path.to_string(),
                offset,
            });
        }
        let entry = files
            .entry(path.to_string())
            .or_insert_with(|| Entry::new(Vec::new()));
        let start = offset as usize;
        let end = start + incoming.len();
        if end > entry.data.len() {
            entry.data.resize(end, 0);
        }
        entry.data[start..end].copy_from_slice(&incoming);
        entry.mod_time = Utc::now();
        Ok(incoming.len() as u64)
    }

    fn stat(&self, path: &str) -> DriverResult<FileInfo> {
        validate_path(path)?;
        let files = self.files.read().expect("lock poisoned");
        if let Some(entry) = files.get(path) {
            return Ok(FileInfo {
                path: path.to_string(),
                size: entry.data.len() as u64,
                mod_time: entry.mod_time,
                is_dir: false,
            });
        }
        if has_children(&files, path) {
            let prefix = dir_prefix(path);
            let mod_time = files
                .iter()
                .filter(|(k, _)| k.starts_with(&prefix))
                .map(|(_, e)| e.mod_time)
                .max()
                .unwrap_or_else(Utc::now);
            return Ok(FileInfo {
                path: path.to_string(),
                size: 0,
                mod_time,
                is_dir: true,
            });
        }
        Err(DriverError::not_found(path))
    }

    fn list(&self, path: &str) -> DriverResult<Vec<String>> {
        validate_path(path)?;
        let files = self.files.read().expect("lock poisoned");
        let prefix = dir_prefix(path);
        let children: BTreeSet<String> = files
            .keys()
            .filter_map(|k| k.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .map(|child| format!("{prefix}{child}"))
            .collect();
        if children.is_empty() {
            return Err(DriverError::not_found(path));
        }
        Ok(children.into_iter().collect())
    }

    fn move_to(&self, source: &str, dest: &str) -> DriverResult<()> {
        validate_path(source)?;
        validate_path(dest)?;
        let mut files = self.files.write().expect("lock poisoned");
        let entry = files
            .remove(source)
            .ok_or_else(|| DriverError::not_found(source))?;
        files.insert(dest.to_string(), entry);
        Ok(())
    }

    fn delete(&self, path: &str) -> DriverResult<()> {
        validate_path(path)?;
        let mut files = self.files.write().expect("lock poisoned");
        let prefix = dir_prefix(path);
        let before = files.len();
        files.retain(|k, _| k != path && !k.starts_with(&prefix));
        if files.len() == before {
            return Err(DriverError::not_found(path));
        }
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryDriver")
            .field("file_count", &self.len())
            .finish()
    }
}
