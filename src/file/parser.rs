//! Cursor-based parser for filesystem descriptor decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor
//! over a byte slice used to decode volume descriptors, directory records, system-use
//! entries and UDF descriptors. All reads validate data availability before touching the
//! buffer, so truncated or crafted structures fail with an error instead of a panic.
//!
//! # Architecture
//!
//! The parser maintains a position within a byte slice and offers:
//!
//! - **Position tracking** - Sequential decoding with `pos`/`seek`/`advance_by`
//! - **Typed reads** - `read_le`/`read_be` for all primitive integer widths
//! - **Slice reads** - `read_bytes` borrowing directly from the input
//! - **Bounds checking** - Every operation is validated against the slice length
//!
//! # Usage Examples
//!
//! ```rust
//! use discscope::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04];
//! let mut parser = Parser::new(&data);
//!
//! let value = parser.read_le::<u16>()?;
//! assert_eq!(value, 0x0201);
//!
//! parser.seek(2)?;
//! let value = parser.read_be::<u16>()?;
//! assert_eq!(value, 0x0304);
//! # Ok::<(), discscope::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, read_le_at, DiscIO},
    Result,
};

/// A generic binary data parser for reading filesystem structures.
///
/// `Parser` provides a cursor-based interface for reading binary data in both little-endian
/// and big-endian formats. It is used for every on-disc structure this crate decodes, from
/// the primary volume descriptor down to individual Rock Ridge system-use entries.
///
/// The parser maintains an internal position cursor and provides bounds checking to prevent
/// buffer overruns when reading malformed or truncated data.
///
/// # Examples
///
/// ```rust
/// use discscope::Parser;
///
/// let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
/// let mut parser = Parser::new(&data);
///
/// let first = parser.read_le::<u32>()?;
/// assert_eq!(first, 0x04030201);
///
/// parser.seek(6)?;
/// let last = parser.read_le::<u16>()?;
/// assert_eq!(last, 0x0807);
/// # Ok::<(), discscope::Error>(())
/// ```
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is data left to read.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the cursor to an absolute position.
    ///
    /// # Arguments
    /// * `pos` - The position to move to
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is beyond the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the new position is beyond the data.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let Some(new_position) = self.position.checked_add(step) else {
            return Err(out_of_bounds_error!());
        };

        if new_position > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = new_position;
        Ok(())
    }

    /// Returns the current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Returns the number of bytes left to read.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Returns the byte at the current position without advancing.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(self.data[self.position])
    }

    /// Read a primitive value in little-endian byte order, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
    pub fn read_le<T: DiscIO>(&mut self) -> Result<T> {
        read_le_at(self.data, &mut self.position)
    }

    /// Read a primitive value in big-endian byte order, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
    pub fn read_be<T: DiscIO>(&mut self) -> Result<T> {
        read_be_at(self.data, &mut self.position)
    }

    /// Read exactly `N` bytes into an owned array, advancing the cursor.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
    pub fn read_bytes_fixed<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read `length` bytes as a borrowed slice, advancing the cursor.
    ///
    /// # Arguments
    /// * `length` - Number of bytes to read
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let Some(end) = self.position.checked_add(length) else {
            return Err(out_of_bounds_error!());
        };

        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }
}
