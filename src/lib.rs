// Copyright 2025 The discscope developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # discscope
//!
//! A read-only virtual filesystem layer for optical disc images, built in pure Rust.
//! `discscope` parses ISO 9660 (ECMA-119) volumes with Rock Ridge and Joliet extensions
//! as well as UDF (ECMA-167) volumes, without mounting anything and without touching a
//! physical drive.
//!
//! ## Features
//!
//! - **Efficient memory access** - Memory-mapped image files with reference-based parsing
//! - **Complete ISO 9660 support** - Joliet, Rock Ridge (SUSP/RRIP), multi-extent files
//! - **Raw image tolerance** - Fuzzy superblock discovery for 2352-byte and 2336-byte
//!   frame dumps and images with leading garbage
//! - **Independent UDF reader** - DVDs, Blu-rays and UDF-bridge hybrid discs
//! - **POSIX metadata** - Modes, ownership, timestamps and symlink targets where the
//!   volume records them
//!
//! ## Quick Start
//!
//! Add `discscope` to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! discscope = "0.1"
//! ```
//!
//! ### Using the Prelude
//!
//! ```rust,ignore
//! use discscope::prelude::*;
//!
//! let mut image = DiscImage::open("disc.iso")?;
//! println!("Volume: {}", image.volume_id());
//! # Ok::<(), discscope::Error>(())
//! ```
//!
//! ### Basic Usage
//!
//! ```rust,ignore
//! use discscope::DiscImage;
//!
//! // Open an image, detecting ISO 9660 or UDF automatically
//! let mut image = DiscImage::open("disc.iso")?;
//!
//! // Walk a directory
//! for entry in image.readdir("/")? {
//!     println!("{} {:>10} {}", entry.mode_string(), entry.size, entry.name);
//! }
//!
//! // Read a file
//! if let Some(stat) = image.stat("/docs/readme.txt")? {
//!     let data = image.read_file(&stat)?;
//!     println!("{} bytes", data.len());
//! }
//! # Ok::<(), discscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! `discscope` is organized into a small set of modules:
//!
//! - [`prelude`] - Convenient re-exports of commonly used types
//! - [`iso9660`] - ISO 9660 volume descriptors, directories, Rock Ridge and the fuzzy
//!   superblock scan
//! - [`udf`] - UDF descriptor tags, volume discovery and file entries
//! - [`stat`] - The filesystem-neutral [`FileStat`] metadata model
//! - [`Error`] and [`Result`] - Comprehensive error handling
//!
//! ## Standards Compliance
//!
//! The readers implement **ECMA-119** (ISO 9660), the **System Use Sharing Protocol**
//! with the **Rock Ridge Interchange Protocol**, the Joliet supplementary descriptor
//! extension and **ECMA-167** (UDF).
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result) with detailed error information:
//!
//! ```rust,ignore
//! use discscope::{DiscImage, Error};
//!
//! match DiscImage::open("disc.iso") {
//!     Ok(image) => println!("Opened"),
//!     Err(Error::NotSupported) => println!("No recognizable filesystem"),
//!     Err(Error::Malformed { message, .. }) => println!("Damaged volume: {}", message),
//!     Err(e) => println!("Other error: {}", e),
//! }
//! ```
#[macro_use]
pub(crate) mod error;
pub(crate) mod file;
pub(crate) mod image;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,ignore
/// use discscope::prelude::*;
///
/// let mut image = DiscImage::open("disc.iso")?;
/// let entries = image.readdir("/")?;
/// # Ok::<(), discscope::Error>(())
/// ```
pub mod prelude;

/// ISO 9660 (ECMA-119) volume parsing with Joliet and Rock Ridge support
///
/// This module implements the primary disc filesystem:
///
/// - **Volume descriptors**: primary and Joliet supplementary descriptors
/// - **Directories**: record parsing, multi-extent folding, name translation
/// - **Rock Ridge**: SUSP entry scanning with POSIX attributes, long names, symlinks,
///   timestamps and directory relocation
/// - **Fuzzy discovery**: superblock scanning across raw frame sizes and byte offsets
///
/// # Examples
///
/// ```rust,ignore
/// use discscope::iso9660::Iso9660Reader;
///
/// let mut reader = Iso9660Reader::open_fuzzy("dump.bin", 2)?;
/// println!("Rock Ridge: {}", reader.has_rock_ridge());
/// # Ok::<(), discscope::Error>(())
/// ```
pub mod iso9660;

/// File metadata shared by both filesystem readers
///
/// The central type is [`FileStat`], which carries the entry name, kind, size, data
/// extents and optional POSIX attributes regardless of which filesystem produced it.
pub mod stat;

/// UDF (ECMA-167) volume parsing
///
/// Authenticated descriptor tags, volume descriptor sequence discovery and file entry
/// parsing for DVD and Blu-ray style volumes.
///
/// # Examples
///
/// ```rust,ignore
/// use discscope::udf::UdfReader;
///
/// let mut reader = UdfReader::open("movie.iso")?;
/// println!("Logical volume: {}", reader.logical_volume_id());
/// # Ok::<(), discscope::Error>(())
/// ```
pub mod udf;

/// `discscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always
/// [`Error`]. Used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `discscope` Error type
///
/// The main error type for all operations in this crate. Provides detailed error
/// information for image access and volume structure parsing.
///
/// # Examples
///
/// ```rust,ignore
/// use discscope::{DiscImage, Error};
///
/// match DiscImage::open("disc.iso") {
///     Ok(image) => println!("Opened successfully"),
///     Err(Error::NotSupported) => println!("No recognizable filesystem"),
///     Err(e) => println!("Error: {}", e),
/// }
/// ```
pub use error::Error;

/// Main entry point for working with disc images of either filesystem.
///
/// See [`DiscImage`] for format auto-detection and unified access.
pub use image::{DiscImage, FilesystemKind};

/// Low-level image access utilities.
///
/// [`VolumeStream`] wraps an image source (file or buffer) behind a seekable read
/// interface, and [`Parser`] decodes little- and big-endian fields from byte slices.
pub use file::{parser::Parser, VolumeStream};

/// Filesystem-neutral file metadata.
pub use stat::{DiscTime, Extent, FileKind, FileStat, PosixAttributes};
