//! Physical file backend for memory-mapped I/O.
//!
//! This module provides the [`crate::file::physical::Physical`] backend that implements the
//! [`crate::file::Backend`] trait for accessing disc images from disk using memory-mapped
//! I/O. Images are often multiple gigabytes, and mapping them avoids loading the entire
//! content into memory upfront while still allowing fast random access to any sector.
//!
//! # Architecture
//!
//! The physical backend maps the image file directly into the process's virtual address
//! space. Only the pages a reader actually touches are faulted in, the operating system
//! handles caching, and slices handed out by [`crate::file::Backend::data_slice`] borrow
//! straight from the mapping without copies.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use discscope::file::{physical::Physical, Backend};
//! use std::path::Path;
//!
//! let physical = Physical::new(Path::new("image.iso"))?;
//! println!("Image size: {} bytes", physical.len());
//!
//! // Read the standard identifier of the primary volume descriptor
//! let id = physical.data_slice(16 * 2048 + 1, 5)?;
//! assert_eq!(id, b"CD001");
//! # Ok::<(), discscope::Error>(())
//! ```

use super::Backend;
use crate::{
    Error::{Error, FileError},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A backend that uses memory-mapped I/O for efficient access to images on disk.
///
/// [`crate::file::physical::Physical`] maps the image into the process's virtual address
/// space, so sector reads anywhere in a large image are cheap and the operating system
/// manages residency through demand paging. All access operations include bounds checking.
///
/// # Examples
///
/// ```rust,ignore
/// use discscope::file::{physical::Physical, Backend};
/// use std::path::Path;
///
/// let physical = Physical::new(Path::new("image.iso"))?;
/// assert!(physical.len() > 16 * 2048);
/// # Ok::<(), discscope::Error>(())
/// ```
#[derive(Debug)]
pub struct Physical {
    /// Memory-mapped image data
    data: Mmap,
}

impl Physical {
    /// Create a new physical backend by memory-mapping the specified file.
    ///
    /// The file is mapped read-only and shared.
    ///
    /// # Arguments
    /// * `path` - Path to the image file on disk
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Error`] if memory mapping fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(FileError(error)),
        };

        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(error) => return Err(Error(error.to_string())),
        };

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };

        if offset_end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
