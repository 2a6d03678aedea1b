//! In-memory backend for buffer-based image access.
//!
//! This module provides the [`crate::file::memory::Memory`] backend that implements the
//! [`crate::file::Backend`] trait over an owned byte buffer. It is used when the image
//! bytes are already in memory, such as embedded images or the synthetic images built by
//! the test suite.

use super::Backend;
use crate::Result;

/// A backend that serves image data from an owned buffer.
///
/// Functionally identical to [`crate::file::physical::Physical`] but without any host I/O;
/// all reads are plain slice operations with bounds checking.
///
/// # Examples
///
/// ```rust,ignore
/// use discscope::file::{memory::Memory, Backend};
///
/// let memory = Memory::new(vec![0u8; 2048])?;
/// assert_eq!(memory.len(), 2048);
/// assert_eq!(memory.data_slice(0, 4)?, &[0, 0, 0, 0]);
/// # Ok::<(), discscope::Error>(())
/// ```
#[derive(Debug)]
pub struct Memory {
    /// The owned image data
    data: Vec<u8>,
}

impl Memory {
    /// Create a new memory backend from an owned buffer.
    ///
    /// # Arguments
    /// * `data` - The raw image bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn new(data: Vec<u8>) -> Result<Memory> {
        if data.is_empty() {
            return Err(crate::Error::Empty);
        }

        Ok(Memory { data })
    }
}

impl Backend for Memory {
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
        &self.data
    }

    fn len(&self) -> usize {
        self.data.len()
    }
}
