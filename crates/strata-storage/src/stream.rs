//! Buffered sequential writer and random-access reader over driver paths.

use std::fmt;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use strata_driver::StorageDriver;

use crate::error::StorageResult;

/// Buffered, resumable writer bound to one driver path.
///
/// Opening a writer on a path that already holds content positions it at
/// the end of that content, so reopening after an interruption appends
/// rather than truncates. Bytes reach the driver once the buffer fills or on
/// [`Write::flush`]; anything still buffered when the process dies is lost
/// and will be missing from the next [`FileWriter::open`] offset.
pub struct FileWriter {
    driver: Arc<dyn StorageDriver>,
    path: String,
    /// Bytes already persisted through the driver.
    flushed: u64,
    buffer: Vec<u8>,
    buffer_size: usize,
}

impl FileWriter {
    /// Open a writer positioned at the end of any existing content.
    pub fn open(
        driver: Arc<dyn StorageDriver>,
        path: impl Into<String>,
        buffer_size: usize,
    ) -> StorageResult<Self> {
        let path = path.into();
        let flushed = match driver.stat(&path) {
            Ok(info) => info.size,
            Err(e) if e.is_not_found() => 0,
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            driver,
            path,
            flushed,
            buffer: Vec::with_capacity(buffer_size.min(64 * 1024)),
            buffer_size: buffer_size.max(1),
        })
    }

    /// Driver path this stream is bound to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Logical write position, including buffered bytes.
    pub fn offset(&self) -> u64 {
        self.flushed + self.buffer.len() as u64
    }

    /// Bytes durably handed to the driver.
    pub fn flushed_offset(&self) -> u64 {
        self.flushed
    }

    /// Flush and return the final size.
    pub fn close(mut self) -> StorageResult<u64> {
        self.flush()?;
        Ok(self.flushed)
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let written = self
            .driver
            .write_stream(&self.path, self.flushed, &mut self.buffer.as_slice())
            .map_err(io::Error::other)?;
        self.flushed += written;
        self.buffer.clear();
        Ok(())
    }
}

impl Write for FileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let before = self.buffer.len();
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= self.buffer_size {
            // A failed write accepts none of `buf`.
            if let Err(e) = self.flush_buffer() {
                self.buffer.truncate(before);
                return Err(e);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()
    }
}

impl fmt::Debug for FileWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileWriter")
            .field("path", &self.path)
            .field("flushed", &self.flushed)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

/// Random-access reader over the content at one driver path.
///
/// The driver stream is opened lazily and reopened after every seek that
/// moves the position. Seeking past the end is allowed; reads there return
/// no bytes.
pub struct FileReader {
    driver: Arc<dyn StorageDriver>,
    path: String,
    size: u64,
    offset: u64,
    stream: Option<Box<dyn Read + Send>>,
}

impl FileReader {
    /// Open a reader at offset zero, recording the current size.
    pub fn open(driver: Arc<dyn StorageDriver>, path: impl Into<String>) -> StorageResult<Self> {
        let path = path.into();
        let size = driver.stat(&path)?.size;
        Ok(Self {
            driver,
            path,
            size,
            offset: 0,
            stream: None,
        })
    }

    /// Driver path this stream is bound to.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Content length observed when the reader was opened.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Current read position.
    pub fn position(&self) -> u64 {
        self.offset
    }
}

impl Read for FileReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.offset >= self.size || buf.is_empty() {
            return Ok(0);
        }
        if self.stream.is_none() {
            let stream = self
                .driver
                .read_stream(&self.path, self.offset)
                .map_err(io::Error::other)?;
            self.stream = Some(stream);
        }
        let remaining = (self.size - self.offset).min(buf.len() as u64) as usize;
        let n = match self.stream.as_mut() {
            Some(stream) => stream.read(&mut buf[..remaining])?,
            None => 0,
        };
        self.offset += n as u64;
        Ok(n)
    }
}

impl Seek for FileReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(n) => Some(n),
            SeekFrom::Current(d) => self.offset.checked_add_signed(d),
            SeekFrom::End(d) => self.size.checked_add_signed(d),
        };
        let target = target.ok_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative offset")
        })?;
        if target != self.offset {
            self.stream = None;
            self.offset = target;
        }
        Ok(self.offset)
    }
}

impl fmt::Debug for FileReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileReader")
            .field("path", &self.path)
            .field("size", &self.size)
            .field("offset", &self.offset)
            .finish()
    }
}
