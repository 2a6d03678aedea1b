//! # discscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types from the
//! discscope library. Import this module to get quick access to the essential types for
//! disc image inspection.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all discscope operations
pub use crate::Error;

/// The result type used throughout discscope
pub use crate::Result;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Format auto-detecting disc image access
pub use crate::{DiscImage, FilesystemKind};

/// The ISO 9660 reader, for direct access to Joliet and Rock Ridge specifics
pub use crate::iso9660::Iso9660Reader;

/// The UDF reader, for direct access to UDF volume identification
pub use crate::udf::UdfReader;

// ================================================================================================
// File Metadata
// ================================================================================================

/// Filesystem-neutral file metadata
pub use crate::stat::{DiscTime, Extent, FileKind, FileStat, PosixAttributes};

/// Logical block size shared by both filesystems
pub use crate::stat::BLOCK_SIZE;

// ================================================================================================
// Low-Level Utilities
// ================================================================================================

/// Low-level image access and field decoding
pub use crate::{Parser, VolumeStream};
