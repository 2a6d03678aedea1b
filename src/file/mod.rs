//! Byte-level access to disc image files.
//!
//! This module provides the storage abstraction underneath both filesystem readers. Disc
//! images can be backed by a memory-mapped file on disk or by an in-memory buffer, and both
//! are exposed through the same bounds-checked interface.
//!
//! # Architecture
//!
//! Access is split into two layers:
//!
//! - **[`crate::file::Backend`]** - A trait for raw byte access (`data_slice`, `data`, `len`),
//!   implemented by [`crate::file::physical::Physical`] (memory-mapped files) and
//!   [`crate::file::memory::Memory`] (owned buffers).
//! - **[`crate::file::VolumeStream`]** - A cursor over a backend that owns the logical
//!   position, opens path-backed images lazily on first read, and supports idempotent close.
//!
//! The filesystem readers never touch a backend directly; all sector reads go through the
//! stream so that open/close lifecycle and short-read semantics live in one place.
//!
//! # Key Components
//!
//! - [`crate::file::Backend`] - Storage trait with bounds-checked slicing
//! - [`crate::file::VolumeStream`] - Position-tracking cursor with lazy open
//! - [`crate::file::parser::Parser`] - Bounds-checked structure decoding
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use discscope::file::VolumeStream;
//!
//! let mut stream = VolumeStream::from_path("image.iso");
//! let mut sector = [0u8; 2048];
//! stream.seek(16 * 2048);
//! let n = stream.read(&mut sector)?;
//! assert_eq!(n, 2048);
//! # Ok::<(), discscope::Error>(())
//! ```

pub(crate) mod io;
pub(crate) mod memory;
pub(crate) mod parser;
pub(crate) mod physical;

use std::path::{Path, PathBuf};

use crate::{file::memory::Memory, file::physical::Physical, Result};

/// Trait abstracting the storage that backs a disc image.
///
/// Implementations provide bounds-checked random access to the raw image bytes. The two
/// implementations shipped with this crate are [`crate::file::physical::Physical`] for
/// memory-mapped files and [`crate::file::memory::Memory`] for owned buffers.
pub trait Backend: Send + Sync {
    /// Returns a slice of the underlying data, verified to be within bounds.
    ///
    /// # Arguments
    /// * `offset` - Byte offset at which the slice starts
    /// * `len` - Length of the requested slice
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `offset + len` exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire underlying data.
    fn data(&self) -> &[u8];

    /// Returns the total size of the underlying data in bytes.
    fn len(&self) -> usize;

    /// Returns `true` if the backend holds no data.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A positioned cursor over a disc image.
///
/// `VolumeStream` owns the backing store and the logical read position. Path-backed streams
/// defer all host I/O until the first read, so constructing one never fails. [`close`] drops
/// the backing store; for path-backed streams a later read transparently reopens the file,
/// while buffer-backed streams stay closed.
///
/// Reads that run past the end of the image return a short count rather than an error,
/// matching the behavior of a plain file read.
///
/// [`close`]: VolumeStream::close
///
/// # Examples
///
/// ```rust,no_run
/// use discscope::VolumeStream;
///
/// let mut stream = VolumeStream::from_mem(vec![0u8; 4096])?;
/// stream.seek(2048);
/// let mut buf = [0u8; 2048];
/// assert_eq!(stream.read(&mut buf)?, 2048);
/// assert_eq!(stream.read(&mut buf)?, 0); // at end
/// # Ok::<(), discscope::Error>(())
/// ```
pub struct VolumeStream {
    /// Path to reopen from, `None` for buffer-backed streams
    source: Option<PathBuf>,
    /// The active backing store, `None` while closed
    backend: Option<Box<dyn Backend>>,
    /// Logical read position in bytes
    position: u64,
}

impl VolumeStream {
    /// Create a stream backed by a file on disk.
    ///
    /// No host I/O happens here; the file is opened and mapped on the first read.
    ///
    /// # Arguments
    /// * `path` - Path to the image file
    pub fn from_path(path: impl AsRef<Path>) -> VolumeStream {
        VolumeStream {
            source: Some(path.as_ref().to_path_buf()),
            backend: None,
            position: 0,
        }
    }

    /// Create a stream backed by an in-memory buffer.
    ///
    /// # Arguments
    /// * `data` - The raw image bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<VolumeStream> {
        Ok(VolumeStream {
            source: None,
            backend: Some(Box::new(Memory::new(data)?)),
            position: 0,
        })
    }

    /// Returns the active backend, lazily opening path-backed streams.
    fn backend(&mut self) -> Result<&dyn Backend> {
        if self.backend.is_none() {
            match &self.source {
                Some(path) => self.backend = Some(Box::new(Physical::new(path)?)),
                None => {
                    return Err(crate::Error::Error(
                        "stream is closed and has no source to reopen".to_string(),
                    ))
                }
            }
        }

        match &self.backend {
            Some(backend) => Ok(backend.as_ref()),
            None => Err(crate::Error::Error("stream is closed".to_string())),
        }
    }

    /// Returns the total size of the image in bytes.
    ///
    /// # Errors
    /// Returns an error if a path-backed stream cannot be opened.
    pub fn len(&mut self) -> Result<u64> {
        Ok(self.backend()?.len() as u64)
    }

    /// Moves the logical position to `pos`.
    ///
    /// Seeking beyond the end of the image is allowed; the next read returns 0 bytes.
    pub fn seek(&mut self, pos: u64) {
        self.position = pos;
    }

    /// Returns the current logical position.
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Reads up to `buf.len()` bytes at the current position, advancing it.
    ///
    /// Returns the number of bytes actually read, which is shorter than the buffer when the
    /// position is near or past the end of the image.
    ///
    /// # Errors
    /// Returns an error if the stream cannot be (re)opened.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let position = self.position;
        let backend = self.backend()?;

        let total = backend.len() as u64;
        if position >= total {
            return Ok(0);
        }

        let available = usize::try_from(total - position).unwrap_or(usize::MAX);
        let count = buf.len().min(available);

        #[allow(clippy::cast_possible_truncation)]
        let slice = backend.data_slice(position as usize, count)?;
        buf[..count].copy_from_slice(slice);

        self.position += count as u64;
        Ok(count)
    }

    /// Returns a slice of exactly `len` bytes at `offset`, without moving the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the image.
    pub fn slice_at(&mut self, offset: u64, len: usize) -> Result<&[u8]> {
        let offset = usize::try_from(offset).map_err(|_| out_of_bounds_error!())?;
        self.backend()?.data_slice(offset, len)
    }

    /// Drops the backing store.
    ///
    /// Idempotent; closing an already closed stream does nothing. Path-backed streams reopen
    /// lazily on the next read.
    pub fn close(&mut self) {
        self.backend = None;
    }

    /// Returns `true` if the backing store is currently open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_and_seek() {
        let data: Vec<u8> = (0..=255).collect();
        let mut stream = VolumeStream::from_mem(data).unwrap();

        let mut buf = [0u8; 4];
        assert_eq!(stream.read(&mut buf).unwrap(), 4);
        assert_eq!(buf, [0, 1, 2, 3]);
        assert_eq!(stream.position(), 4);

        stream.seek(254);
        assert_eq!(stream.read(&mut buf).unwrap(), 2);
        assert_eq!(buf[..2], [254, 255]);

        // past the end
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
        stream.seek(10_000);
        assert_eq!(stream.read(&mut buf).unwrap(), 0);
    }

    #[test]
    fn slice_at_bounds() {
        let mut stream = VolumeStream::from_mem(vec![7u8; 16]).unwrap();
        assert_eq!(stream.slice_at(0, 16).unwrap().len(), 16);
        assert!(stream.slice_at(1, 16).is_err());
        assert!(stream.slice_at(u64::MAX, 1).is_err());
    }

    #[test]
    fn close_is_idempotent() {
        let mut stream = VolumeStream::from_mem(vec![1u8; 8]).unwrap();
        assert!(stream.is_open());
        stream.close();
        stream.close();
        assert!(!stream.is_open());

        // buffer-backed streams cannot reopen
        let mut buf = [0u8; 1];
        assert!(stream.read(&mut buf).is_err());
    }

    #[test]
    fn lazy_open_from_path() {
        let temp_path = std::env::temp_dir().join("discscope_lazy_open.bin");
        std::fs::write(&temp_path, [0xAAu8; 32]).unwrap();

        let mut stream = VolumeStream::from_path(&temp_path);
        assert!(!stream.is_open());

        let mut buf = [0u8; 8];
        assert_eq!(stream.read(&mut buf).unwrap(), 8);
        assert!(stream.is_open());
        assert_eq!(buf, [0xAA; 8]);

        stream.close();
        assert_eq!(stream.read(&mut buf).unwrap(), 8);

        std::fs::remove_file(&temp_path).unwrap();
    }

    #[test]
    fn empty_buffer_rejected() {
        assert!(matches!(
            VolumeStream::from_mem(Vec::new()),
            Err(crate::Error::Empty)
        ));
    }
}
