//! Format auto-detection and unified disc image access.
//!
//! [`DiscImage`] probes an image for an ISO 9660 superblock first and falls back to UDF,
//! then dispatches every operation to the matching reader. Hybrid discs carrying both
//! structures are opened as ISO 9660; use [`crate::udf::UdfReader`] directly to reach
//! the UDF view of such a disc.

use std::path::Path;

use tracing::debug;

use crate::{
    file::VolumeStream,
    iso9660::Iso9660Reader,
    stat::FileStat,
    udf::UdfReader,
    Result,
};

/// The filesystem found on an opened image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesystemKind {
    /// ISO 9660, possibly with Joliet and Rock Ridge extensions
    Iso9660,
    /// UDF
    Udf,
}

/// A disc image opened through format auto-detection.
///
/// # Examples
///
/// ```rust,ignore
/// use discscope::DiscImage;
///
/// let mut image = DiscImage::open("disc.iso")?;
/// println!("{} volume: {}", match image.kind() {
///     discscope::FilesystemKind::Iso9660 => "ISO 9660",
///     discscope::FilesystemKind::Udf => "UDF",
/// }, image.volume_id());
///
/// for entry in image.readdir("/")? {
///     println!("{} {:>10} {}", entry.mode_string(), entry.size, entry.name);
/// }
/// ```
pub enum DiscImage {
    /// An ISO 9660 image
    Iso9660(Iso9660Reader),
    /// A UDF image
    Udf(UdfReader),
}

impl DiscImage {
    /// Open an image file, detecting the filesystem automatically.
    ///
    /// # Arguments
    /// * `path` - Path to the image file
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if neither an ISO 9660 superblock nor a
    /// UDF anchor descriptor is found.
    pub fn open(path: impl AsRef<Path>) -> Result<DiscImage> {
        let stream = VolumeStream::from_path(path);
        Self::detect(stream, 0)
    }

    /// Open an image file with a fuzzy ISO 9660 superblock scan.
    ///
    /// The tolerance applies to the ISO 9660 probe only; raw-frame and shifted images
    /// are an ISO 9660 concern.
    ///
    /// # Arguments
    /// * `path` - Path to the image file
    /// * `fuzz` - Superblock scan tolerance in sectors
    ///
    /// # Errors
    /// Same conditions as [`DiscImage::open`].
    pub fn open_fuzzy(path: impl AsRef<Path>, fuzz: u32) -> Result<DiscImage> {
        let stream = VolumeStream::from_path(path);
        Self::detect(stream, fuzz)
    }

    /// Open an image held in memory, detecting the filesystem automatically.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty buffer, otherwise the same
    /// conditions as [`DiscImage::open`].
    pub fn from_mem(data: Vec<u8>) -> Result<DiscImage> {
        let stream = VolumeStream::from_mem(data)?;
        Self::detect(stream, 0)
    }

    /// Probe the stream for each filesystem in turn and build the matching reader.
    fn detect(mut stream: VolumeStream, fuzz: u32) -> Result<DiscImage> {
        match Iso9660Reader::probe(&mut stream, fuzz) {
            Ok(volume) => {
                debug!("image detected as ISO 9660");
                return Ok(DiscImage::Iso9660(Iso9660Reader::from_parts(stream, volume)));
            }
            Err(crate::Error::NotSupported) => {}
            Err(err) => return Err(err),
        }

        match UdfReader::probe(&mut stream) {
            Ok(volume) => {
                debug!("image detected as UDF");
                Ok(DiscImage::Udf(UdfReader::from_parts(stream, volume)))
            }
            Err(crate::Error::NotSupported) => Err(crate::Error::NotSupported),
            Err(err) => Err(err),
        }
    }

    /// The filesystem the image was opened as.
    pub fn kind(&self) -> FilesystemKind {
        match self {
            DiscImage::Iso9660(_) => FilesystemKind::Iso9660,
            DiscImage::Udf(_) => FilesystemKind::Udf,
        }
    }

    /// Look up a path and return its metadata, or `None` if no entry exists.
    ///
    /// # Errors
    /// Returns an error only for I/O or structural failures, not for absent paths.
    pub fn stat(&mut self, path: &str) -> Result<Option<FileStat>> {
        match self {
            DiscImage::Iso9660(reader) => reader.stat(path),
            DiscImage::Udf(reader) => reader.stat(path),
        }
    }

    /// List a directory.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the path does not exist or is not a
    /// directory.
    pub fn readdir(&mut self, path: &str) -> Result<Vec<FileStat>> {
        match self {
            DiscImage::Iso9660(reader) => reader.readdir(path),
            DiscImage::Udf(reader) => reader.readdir(path),
        }
    }

    /// Find the entry that owns logical block `lsn`, together with its full path.
    ///
    /// # Errors
    /// Returns an error for structural failures while walking.
    pub fn find_by_block(&mut self, lsn: u32) -> Result<Option<(FileStat, String)>> {
        match self {
            DiscImage::Iso9660(reader) => reader.find_by_block(lsn),
            DiscImage::Udf(reader) => reader.find_by_block(lsn),
        }
    }

    /// Read the complete contents of a file.
    ///
    /// # Arguments
    /// * `stat` - Metadata returned by [`DiscImage::stat`] or [`DiscImage::readdir`]
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if an extent reaches past the image.
    pub fn read_file(&mut self, stat: &FileStat) -> Result<Vec<u8>> {
        match self {
            DiscImage::Iso9660(reader) => reader.read_file(stat),
            DiscImage::Udf(reader) => reader.read_file(stat),
        }
    }

    /// The volume identifier.
    pub fn volume_id(&self) -> String {
        match self {
            DiscImage::Iso9660(reader) => reader.volume_id(),
            DiscImage::Udf(reader) => reader.volume_id().to_string(),
        }
    }

    /// The volume set identifier.
    pub fn volume_set_id(&self) -> String {
        match self {
            DiscImage::Iso9660(reader) => reader.volume_set_id(),
            DiscImage::Udf(reader) => reader.volume_set_id().to_string(),
        }
    }

    /// Close the underlying stream. Further reads fail for buffer-backed streams.
    pub fn close(&mut self) {
        match self {
            DiscImage::Iso9660(reader) => reader.close(),
            DiscImage::Udf(reader) => reader.close(),
        }
    }
}
