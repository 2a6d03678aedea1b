//! Low-level byte order utilities for descriptor parsing.
//!
//! This module provides endian-aware, bounds-checked reading of primitive types from byte
//! buffers. ISO 9660 records most integers in both byte orders, UDF records them
//! little-endian, and Joliet names are big-endian UCS-2, so both orders are needed
//! throughout the readers.
//!
//! # Architecture
//!
//! The module is built around the [`crate::file::io::DiscIO`] trait which unifies the
//! conversion from fixed-size byte arrays to typed values. On top of it sit free functions
//! for one-shot reads ([`crate::file::io::read_le`], [`crate::file::io::read_be`]) and
//! offset-advancing reads ([`crate::file::io::read_le_at`],
//! [`crate::file::io::read_be_at`]).
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use discscope::file::io::{read_le_at, read_be_at};
//!
//! let data = [0x01, 0x00, 0x00, 0x01]; // 1 as u16 LE, then 1 as u16 BE
//! let mut offset = 0;
//!
//! let le: u16 = read_le_at(&data, &mut offset)?;
//! let be: u16 = read_be_at(&data, &mut offset)?;
//! assert_eq!(le, 1);
//! assert_eq!(be, 1);
//! assert_eq!(offset, 4);
//! # Ok::<(), discscope::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All reading functions return [`crate::Result`] and report
//! [`crate::Error::OutOfBounds`] if there are insufficient bytes in the buffer, preventing
//! buffer overruns on truncated or crafted images.

use crate::Result;

/// Trait for implementing type-specific safe binary data reading operations.
///
/// This trait provides a unified interface for reading primitive types from byte slices in
/// a safe and endian-aware manner. It is implemented for the integer types that appear in
/// ECMA-119 and ECMA-167 structures.
pub trait DiscIO: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
}

macro_rules! impl_disc_io {
    ($($t:ty),*) => {
        $(
            impl DiscIO for $t {
                type Bytes = [u8; std::mem::size_of::<$t>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$t>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$t>::from_be_bytes(bytes)
                }
            }
        )*
    };
}

impl_disc_io!(u8, i8, u16, i16, u32, i32, u64, i64);

/// Safely reads a value of type `T` in little-endian byte order from the buffer start.
///
/// # Arguments
/// * `data` - The byte buffer to read from
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le<T: DiscIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_le_at(data, &mut offset)
}

/// Safely reads a value of type `T` in big-endian byte order from the buffer start.
///
/// # Arguments
/// * `data` - The byte buffer to read from
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be<T: DiscIO>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Safely reads a value of type `T` in little-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read.
///
/// # Arguments
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_le_at<T: DiscIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset += type_len;

    Ok(T::from_le_bytes(read))
}

/// Safely reads a value of type `T` in big-endian byte order at a specific offset.
///
/// The offset is advanced by the number of bytes read.
///
/// # Arguments
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position
///
/// # Errors
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
pub fn read_be_at<T: DiscIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset += type_len;

    Ok(T::from_be_bytes(read))
}
