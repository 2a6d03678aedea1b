//! UDF (ECMA-167) filesystem reader.
//!
//! Reads the Universal Disc Format filesystem found on DVDs and Blu-rays and on hybrid
//! discs alongside an ISO 9660 structure. The reader is independent of the ISO 9660
//! implementation and works on any 2048-byte-sector image.
//!
//! # Architecture
//!
//! Discovery starts at the anchor volume descriptor pointer on sector 256 and walks the
//! main volume descriptor sequence to the partition, the logical volume and the file set
//! descriptor, which names the root directory ICB. Every descriptor is authenticated by
//! its 16-byte tag (header checksum plus CRC-CCITT over the body) before use.
//!
//! # Key Components
//!
//! - [`UdfReader`] - Opens an image and exposes lookup, listing and reading
//! - [`tag::DescriptorTag`] - Descriptor tag verification
//! - Volume discovery and file entry parsing in the `volume` and `file` submodules
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use discscope::udf::UdfReader;
//!
//! let mut reader = UdfReader::open("movie.iso")?;
//! for entry in reader.readdir("/VIDEO_TS")? {
//!     println!("{} {}", entry.mode_string(), entry.name);
//! }
//! ```

pub(crate) mod file;
pub mod tag;
pub(crate) mod volume;

use tracing::warn;
use widestring::U16Str;

use crate::{
    file::VolumeStream,
    stat::FileStat,
    udf::{
        file::FileEntry,
        volume::{read_sector, UdfVolume},
    },
    Result,
};

/// UDF logical block size supported by this reader.
pub const UDF_BLOCKSIZE: u32 = 2048;

/// Directory recursion limit for block searches.
const MAX_DIR_DEPTH: usize = 64;

/// Decode OSTA compressed unicode characters.
///
/// The first byte selects the compression: 8 for Latin-1, 16 for UCS-2 big endian.
pub(crate) fn decode_dchars(data: &[u8]) -> String {
    let Some((&compression, rest)) = data.split_first() else {
        return String::new();
    };

    match compression {
        8 => rest.iter().map(|&b| char::from(b)).collect(),
        16 => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            U16Str::from_slice(&units).to_string_lossy()
        }
        _ => String::new(),
    }
}

/// Decode a fixed-size dstring field, whose final byte holds the recorded length.
pub(crate) fn decode_dstring(field: &[u8]) -> String {
    let Some((&len, content)) = field.split_last() else {
        return String::new();
    };
    let len = usize::from(len).min(content.len());
    decode_dchars(&content[..len])
}

/// Reader for UDF filesystems.
///
/// # Examples
///
/// ```rust,ignore
/// use discscope::udf::UdfReader;
///
/// let mut reader = UdfReader::open("image.iso")?;
/// let stat = reader.stat("/docs/manual.pdf")?;
/// let data = reader.read_file(&stat)?;
/// ```
pub struct UdfReader {
    stream: VolumeStream,
    volume: UdfVolume,
}

impl UdfReader {
    /// Open a UDF image from a file path.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if no anchor descriptor is found at sector
    /// 256, or [`crate::Error::Malformed`] for damaged volume structures.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<UdfReader> {
        let mut stream = VolumeStream::from_path(path);
        let volume = volume::discover(&mut stream)?;
        Ok(UdfReader { stream, volume })
    }

    /// Open a UDF image already held in memory.
    ///
    /// # Errors
    /// Same conditions as [`UdfReader::open`], plus [`crate::Error::Empty`] for an empty
    /// buffer.
    pub fn from_mem(data: Vec<u8>) -> Result<UdfReader> {
        let mut stream = VolumeStream::from_mem(data)?;
        let volume = volume::discover(&mut stream)?;
        Ok(UdfReader { stream, volume })
    }

    /// Build a reader from an already probed stream.
    pub(crate) fn from_parts(stream: VolumeStream, volume: UdfVolume) -> UdfReader {
        UdfReader { stream, volume }
    }

    /// Probe a stream for UDF volume structures without consuming it.
    pub(crate) fn probe(stream: &mut VolumeStream) -> Result<UdfVolume> {
        volume::discover(stream)
    }

    /// Read the file entry at a partition-relative block and convert it to a stat.
    fn stat_at(&mut self, lba: u32, name: &str) -> Result<FileStat> {
        let block = read_sector(&mut self.stream, self.volume.absolute(lba))?;
        let entry = FileEntry::read(&block, &self.volume, lba)?;
        Ok(self.entry_to_stat(&entry, name))
    }

    fn entry_to_stat(&self, entry: &FileEntry, name: &str) -> FileStat {
        FileStat {
            name: name.to_string(),
            kind: entry.kind(),
            size: entry.info_len,
            extents: entry.extents.clone(),
            time: entry.modification_time,
            posix: Some(entry.posix()),
            symlink: None,
            rock_ridge: false,
        }
    }

    /// Read the raw data of a stat, honouring every extent and the recorded size.
    fn read_data(&mut self, stat: &FileStat) -> Result<Vec<u8>> {
        let mut data = Vec::with_capacity(stat.size as usize);
        let mut remaining = stat.size;

        for extent in &stat.extents {
            if remaining == 0 {
                break;
            }
            let take = u64::from(extent.size).min(remaining);
            let offset = u64::from(extent.lsn) * u64::from(UDF_BLOCKSIZE);
            data.extend_from_slice(self.stream.slice_at(offset, take as usize)?);
            remaining -= take;
        }

        Ok(data)
    }

    /// List the entries of a directory, given its stat.
    ///
    /// The listing starts with a `.` entry for the directory itself. Entries flagged as
    /// deleted are omitted; hidden entries are included.
    fn list_dir(&mut self, dir: &FileStat) -> Result<Vec<FileStat>> {
        if !dir.is_dir() {
            return Err(malformed_error!("Not a directory - {}", dir.name));
        }

        let data = self.read_data(dir)?;
        let identifiers = file::read_identifiers(&data)?;

        let mut self_entry = dir.clone();
        self_entry.name = String::from(".");
        let mut entries = vec![self_entry];

        // A damaged child entry only loses that entry, never its siblings.
        for fid in identifiers {
            if fid.is_deleted() {
                continue;
            }
            match self.stat_at(fid.icb_lba, &fid.name) {
                Ok(stat) => entries.push(stat),
                Err(err) => warn!("skipping unreadable entry '{}': {err}", fid.name),
            }
        }

        Ok(entries)
    }

    /// Stat of the root directory, named `.`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the root ICB cannot be read.
    pub fn root_stat(&mut self) -> Result<FileStat> {
        let root_lba = self.volume.root_icb.lba;
        self.stat_at(root_lba, ".")
    }

    /// Look up a path and return its metadata, or `None` if no entry exists.
    ///
    /// Components are separated by `/` or `\` and matched case-sensitively. Empty
    /// components are ignored, so `/a//b` and `a/b` name the same entry.
    ///
    /// # Arguments
    /// * `path` - Path from the root directory
    ///
    /// # Errors
    /// Returns an error only for I/O or structural failures, not for absent paths.
    pub fn stat(&mut self, path: &str) -> Result<Option<FileStat>> {
        let mut current = self.root_stat()?;

        for component in path.split(['/', '\\']) {
            if component.is_empty() || component == "." {
                continue;
            }
            if !current.is_dir() {
                return Ok(None);
            }

            let entries = self.list_dir(&current)?;
            let Some(found) = entries
                .into_iter()
                .skip(1)
                .find(|entry| entry.name == component)
            else {
                return Ok(None);
            };
            current = found;
        }

        Ok(Some(current))
    }

    /// List a directory by path.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the path does not exist or is not a
    /// directory.
    pub fn readdir(&mut self, path: &str) -> Result<Vec<FileStat>> {
        let Some(dir) = self.stat(path)? else {
            return Err(malformed_error!("No such directory - {path}"));
        };
        self.list_dir(&dir)
    }

    /// Find the file whose data contains the given absolute sector, together with its
    /// full path.
    ///
    /// # Errors
    /// Returns [`crate::Error::RecursionLimit`] for pathologically deep trees, or other
    /// errors for structural failures while walking.
    pub fn find_by_block(&mut self, lsn: u32) -> Result<Option<(FileStat, String)>> {
        let root = self.root_stat()?;
        self.find_in_dir(&root, String::new(), lsn, 0)
    }

    fn find_in_dir(
        &mut self,
        dir: &FileStat,
        prefix: String,
        lsn: u32,
        depth: usize,
    ) -> Result<Option<(FileStat, String)>> {
        if depth >= MAX_DIR_DEPTH {
            return Err(crate::Error::RecursionLimit(MAX_DIR_DEPTH));
        }

        for entry in self.list_dir(dir)?.into_iter().skip(1) {
            if entry.name == ".." {
                continue;
            }
            let path = format!("{prefix}/{}", entry.name);
            if entry.contains_block(lsn) {
                return Ok(Some((entry, path)));
            }
            if entry.is_dir() {
                if let Some(found) = self.find_in_dir(&entry, path, lsn, depth + 1)? {
                    return Ok(Some(found));
                }
            }
        }

        Ok(None)
    }

    /// Read the full contents of a file.
    ///
    /// # Arguments
    /// * `stat` - A stat previously returned by [`UdfReader::stat`] or
    ///   [`UdfReader::readdir`]
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if an extent reaches past the image.
    pub fn read_file(&mut self, stat: &FileStat) -> Result<Vec<u8>> {
        self.read_data(stat)
    }

    /// Volume identifier from the primary volume descriptor.
    pub fn volume_id(&self) -> &str {
        &self.volume.volume_id
    }

    /// Volume set identifier from the primary volume descriptor.
    pub fn volume_set_id(&self) -> &str {
        &self.volume.volume_set_id
    }

    /// Logical volume identifier.
    pub fn logical_volume_id(&self) -> &str {
        &self.volume.logical_volume_id
    }

    /// File set identifier from the file set descriptor.
    pub fn fileset_id(&self) -> &str {
        &self.volume.fileset_id
    }

    /// Close the underlying stream. Further reads fail for buffer-backed streams.
    pub fn close(&mut self) {
        self.stream.close();
    }
}
