//! # fio — positioned byte-file access
//!
//! A thin wrapper around [`std::fs::File`] exposing the narrow capability the
//! database engine needs: positioned and cursor-relative reads and writes,
//! size/position/eof queries, shrink-only truncation, and file removal that
//! overrides read-only permission bits.
//!
//! The cursor model matches `lseek` semantics: unpositioned transfers run at
//! the current cursor and advance it; positioned transfers seek first and
//! leave the cursor just past the transferred range, so a positioned call can
//! be followed by unpositioned calls that continue sequentially.
//!
//! Short reads and short writes are failures — `read` either fills the whole
//! buffer or returns an error.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::time::UNIX_EPOCH;

use thiserror::Error;

/// Errors produced by file operations.
#[derive(Debug, Error)]
pub enum FioError {
    /// An underlying I/O error, including short reads (`UnexpectedEof`).
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// `truncate` was asked to grow the file or keep its size.
    #[error("truncate position {position} is not below file size {size}")]
    InvalidTruncate { position: u64, size: u64 },
}

pub type Result<T> = std::result::Result<T, FioError>;

/// An open byte file with an explicit cursor.
///
/// The file is closed when the value is dropped.
#[derive(Debug)]
pub struct FileIo {
    file: File,
}

impl FileIo {
    /// Opens an existing file. Fails if the file does not exist.
    pub fn open<P: AsRef<Path>>(path: P, read_only: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(!read_only)
            .open(path)?;
        Ok(Self { file })
    }

    /// Creates a new file for reading and writing. Fails if the file already
    /// exists.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// Removes a file even when it is marked read-only.
    pub fn erase<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if let Ok(metadata) = std::fs::metadata(path) {
            let mut permissions = metadata.permissions();
            if permissions.readonly() {
                #[allow(clippy::permissions_set_readonly_false)]
                permissions.set_readonly(false);
                std::fs::set_permissions(path, permissions)?;
            }
        }
        std::fs::remove_file(path)?;
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes at the cursor, advancing it.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Reads exactly `buf.len()` bytes starting at `position`. The cursor is
    /// left just past the range read.
    pub fn read_at(&mut self, position: u64, buf: &mut [u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(position))?;
        self.file.read_exact(buf)?;
        Ok(())
    }

    /// Writes all of `buf` at the cursor, advancing it.
    pub fn write(&mut self, buf: &[u8]) -> Result<()> {
        self.file.write_all(buf)?;
        Ok(())
    }

    /// Writes all of `buf` starting at `position`. The cursor is left just
    /// past the range written.
    pub fn write_at(&mut self, position: u64, buf: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(position))?;
        self.file.write_all(buf)?;
        Ok(())
    }

    /// Current file size in bytes.
    pub fn size(&mut self) -> Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    /// Current cursor position.
    pub fn position(&mut self) -> Result<u64> {
        Ok(self.file.stream_position()?)
    }

    /// True when the cursor is at or past the end of the file.
    pub fn eof(&mut self) -> Result<bool> {
        let position = self.position()?;
        Ok(position >= self.size()?)
    }

    /// Shrinks the file to `position` bytes and moves the cursor to the new
    /// end. `position` must be strictly below the current size.
    pub fn truncate(&mut self, position: u64) -> Result<()> {
        let size = self.size()?;
        if position >= size {
            return Err(FioError::InvalidTruncate { position, size });
        }
        self.file.set_len(position)?;
        self.file.seek(SeekFrom::End(0))?;
        Ok(())
    }

    /// Seconds since the Unix epoch of the last modification.
    pub fn timestamp(&self) -> Result<u64> {
        let modified = self.file.metadata()?.modified()?;
        let since_epoch = modified
            .duration_since(UNIX_EPOCH)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        Ok(since_epoch.as_secs())
    }
}
