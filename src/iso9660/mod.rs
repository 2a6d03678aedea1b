//! ISO 9660 (ECMA-119) filesystem reader with Rock Ridge and Joliet support.
//!
//! This module implements the primary filesystem found on optical media. It locates and
//! decodes the volume descriptors, walks directory extents, folds multi-extent files,
//! applies the Rock Ridge (SUSP/RRIP) and Joliet extensions, and resolves paths to
//! [`crate::FileStat`] entries.
//!
//! # Architecture
//!
//! Opening a volume proceeds in stages:
//!
//! 1. **Superblock** - The primary volume descriptor at sector 16 is read and validated
//!    ([`crate::iso9660::descriptor`]); supplementary descriptors are scanned for a Joliet
//!    escape sequence.
//! 2. **Geometry** - Images with raw 2352/2336-byte frames or a shifted payload are
//!    handled by the tolerant scan in [`crate::iso9660::fuzzy`], which infers the frame
//!    size and byte offset correction once at open time.
//! 3. **Directories** - Path and block lookups walk directory extents
//!    ([`crate::iso9660::directory`]), consulting the Rock Ridge system-use area
//!    ([`crate::iso9660::rockridge`]) and the name translation rules
//!    ([`crate::iso9660::name`]) for every record.
//!
//! # Key Components
//!
//! - [`crate::iso9660::Iso9660Reader`] - The reader handle with all public operations
//! - [`crate::iso9660::descriptor::PrimaryVolumeDescriptor`] - Decoded superblock
//! - [`crate::iso9660::fuzzy`] - Tolerant superblock discovery
//! - [`crate::iso9660::rockridge::RockRidge`] - Decoded system-use fields
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use discscope::iso9660::Iso9660Reader;
//!
//! let mut reader = Iso9660Reader::open("image.iso")?;
//! for entry in reader.readdir("/")? {
//!     println!("{} {}", entry.mode_string(), entry.name);
//! }
//! # Ok::<(), discscope::Error>(())
//! ```

pub(crate) mod descriptor;
pub(crate) mod directory;
pub(crate) mod fuzzy;
pub(crate) mod name;
pub(crate) mod rockridge;

use tracing::{debug, warn};

use crate::{
    file::{parser::Parser, VolumeStream},
    iso9660::{
        descriptor::{PrimaryVolumeDescriptor, SupplementaryVolumeDescriptor},
        directory::DirEntry,
    },
    stat::BLOCK_SIZE,
    Extent, FileKind, FileStat, Result,
};

use std::path::Path;

/// Logical block size of an ISO 9660 volume in bytes.
pub const ISO_BLOCKSIZE: u32 = 2048;
/// Sector of the primary volume descriptor.
pub const ISO_PVD_SECTOR: u32 = 16;
/// Raw frame size of a mode-1/mode-2 sector including sync and headers.
pub const ISO_FRAMESIZE_RAW: u32 = 2352;
/// Frame size of a mode-2 sector without the sync header.
pub const ISO_FRAMESIZE_M2RAW: u32 = 2336;
/// Size of the sync field at the start of a raw frame.
pub const ISO_SYNC_SIZE: u32 = 12;
/// Standard identifier carried by every volume descriptor.
pub const ISO_STANDARD_ID: &[u8; 5] = b"CD001";
/// Volume descriptor type: primary.
pub const ISO_VD_PRIMARY: u8 = 1;
/// Volume descriptor type: supplementary.
pub const ISO_VD_SUPPLEMENTARY: u8 = 2;
/// Volume descriptor type: set terminator.
pub const ISO_VD_END: u8 = 255;
/// Maximum number of parts a multi-extent file may have.
pub const ISO_MAX_MULTIEXTENT: usize = 8;

/// Upper bound on volume descriptors scanned before giving up on a terminator.
const MAX_DESCRIPTOR_SCAN: u32 = 256;
/// Directory nesting bound for recursive block searches.
const MAX_DIR_DEPTH: usize = 64;

/// Frame layout of the image, inferred at open time.
///
/// Plain images use 2048-byte frames with no correction. Raw rips use 2352 or 2336-byte
/// frames with the payload shifted by the sync header, and images with leading garbage
/// additionally carry a byte offset correction found by the fuzzy scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectorGeometry {
    /// Bytes per frame on the image
    pub frame_size: u32,
    /// Offset of the 2048-byte payload within a frame
    pub data_start: u32,
    /// Byte correction applied to every frame position
    pub fuzzy_offset: i64,
}

impl Default for SectorGeometry {
    fn default() -> Self {
        SectorGeometry {
            frame_size: ISO_BLOCKSIZE,
            data_start: 0,
            fuzzy_offset: 0,
        }
    }
}

impl SectorGeometry {
    /// Absolute byte position of the payload of block `lsn`.
    pub(crate) fn byte_offset(&self, lsn: u32) -> i64 {
        i64::from(lsn) * i64::from(self.frame_size) + self.fuzzy_offset + i64::from(self.data_start)
    }
}

/// Reads one 2048-byte logical block through the frame geometry.
pub(crate) fn read_block(
    stream: &mut VolumeStream,
    geometry: SectorGeometry,
    lsn: u32,
) -> Result<Vec<u8>> {
    let offset = geometry.byte_offset(lsn);
    let offset = u64::try_from(offset).map_err(|_| out_of_bounds_error!())?;

    Ok(stream.slice_at(offset, ISO_BLOCKSIZE as usize)?.to_vec())
}

/// Reads `count` consecutive logical blocks into one buffer.
///
/// Raw frame layouts interleave headers between payloads, so blocks are read one frame at
/// a time.
pub(crate) fn read_blocks(
    stream: &mut VolumeStream,
    geometry: SectorGeometry,
    lsn: u32,
    count: u32,
) -> Result<Vec<u8>> {
    // count and lsn are on-disc fields and must not wrap
    let total = u64::from(count) * u64::from(ISO_BLOCKSIZE);
    let capacity = usize::try_from(total).map_err(|_| out_of_bounds_error!())?;
    let mut data = Vec::with_capacity(capacity.min(stream.len()? as usize));

    for i in 0..count {
        let block = lsn.checked_add(i).ok_or_else(|| out_of_bounds_error!())?;
        data.extend_from_slice(&read_block(stream, geometry, block)?);
    }
    Ok(data)
}

/// Reads an ISO 9660 both-endian 32-bit field (8 bytes, little-endian then big-endian).
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the two halves disagree.
pub(crate) fn read_both_u32(parser: &mut Parser) -> Result<u32> {
    let le = parser.read_le::<u32>()?;
    let be = parser.read_be::<u32>()?;
    if le != be {
        return Err(malformed_error!(
            "Both-endian field mismatch - le: {le}, be: {be}"
        ));
    }
    Ok(le)
}

/// Reads an ISO 9660 both-endian 16-bit field (4 bytes, little-endian then big-endian).
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if the two halves disagree.
pub(crate) fn read_both_u16(parser: &mut Parser) -> Result<u16> {
    let le = parser.read_le::<u16>()?;
    let be = parser.read_be::<u16>()?;
    if le != be {
        return Err(malformed_error!(
            "Both-endian field mismatch - le: {le}, be: {be}"
        ));
    }
    Ok(le)
}

/// Decoded volume descriptors plus the geometry they were found with.
pub(crate) struct IsoVolume {
    pub geometry: SectorGeometry,
    pub pvd: PrimaryVolumeDescriptor,
    pub svd: Option<SupplementaryVolumeDescriptor>,
    /// SUSP skip value learned from the root directory's first record
    pub susp_skip: u8,
    /// Set once any Rock Ridge field has been seen on the volume
    pub rock_ridge: bool,
}

/// A mounted ISO 9660 filesystem.
///
/// Created by [`open`], [`open_fuzzy`] or [`from_mem`]; all further operations resolve
/// paths with `/` separators against the directory hierarchy. When the volume carries a
/// Joliet supplementary descriptor its directory tree is preferred, and Rock Ridge fields
/// override names and attributes wherever they are present.
///
/// [`open`]: Iso9660Reader::open
/// [`open_fuzzy`]: Iso9660Reader::open_fuzzy
/// [`from_mem`]: Iso9660Reader::from_mem
///
/// # Examples
///
/// ```rust,ignore
/// use discscope::iso9660::Iso9660Reader;
///
/// let mut reader = Iso9660Reader::open("image.iso")?;
/// println!("Volume: {}", reader.volume_id());
///
/// if let Some(stat) = reader.stat("/boot/vmlinuz")? {
///     println!("{} bytes at block {}", stat.size, stat.lsn().unwrap());
/// }
/// # Ok::<(), discscope::Error>(())
/// ```
pub struct Iso9660Reader {
    stream: VolumeStream,
    volume: IsoVolume,
}

impl Iso9660Reader {
    /// Open an image file expecting the standard 2048-byte frame layout.
    ///
    /// # Arguments
    /// * `path` - Path to the image file
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if no valid primary volume descriptor is
    /// found at sector 16, or other errors for I/O and structural failures.
    pub fn open(path: impl AsRef<Path>) -> Result<Iso9660Reader> {
        let mut stream = VolumeStream::from_path(path);
        let volume = Self::probe(&mut stream, 0)?;
        Ok(Iso9660Reader { stream, volume })
    }

    /// Open an image file, searching for the superblock when it is not at the canonical
    /// position.
    ///
    /// The scan tries frame sizes 2048, 2352 and 2336 at candidate sectors up to `fuzz`
    /// away from sector 16 and infers the byte offset correction from where the standard
    /// identifier is found.
    ///
    /// # Arguments
    /// * `path` - Path to the image file
    /// * `fuzz` - Tolerance of the scan in sectors
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if no superblock is found within the
    /// tolerance.
    pub fn open_fuzzy(path: impl AsRef<Path>, fuzz: u32) -> Result<Iso9660Reader> {
        let mut stream = VolumeStream::from_path(path);
        let volume = Self::probe(&mut stream, fuzz)?;
        Ok(Iso9660Reader { stream, volume })
    }

    /// Open an image held in memory.
    ///
    /// # Arguments
    /// * `data` - The raw image bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] for an empty buffer and
    /// [`crate::Error::NotSupported`] if no valid superblock is found.
    pub fn from_mem(data: Vec<u8>) -> Result<Iso9660Reader> {
        let mut stream = VolumeStream::from_mem(data)?;
        let volume = Self::probe(&mut stream, 0)?;
        Ok(Iso9660Reader { stream, volume })
    }

    /// Build a reader from an already probed stream.
    pub(crate) fn from_parts(stream: VolumeStream, volume: IsoVolume) -> Iso9660Reader {
        Iso9660Reader { stream, volume }
    }

    /// Locate and decode the volume descriptors on `stream`.
    pub(crate) fn probe(stream: &mut VolumeStream, fuzz: u32) -> Result<IsoVolume> {
        let geometry = if fuzz == 0 {
            SectorGeometry::default()
        } else {
            fuzzy::locate_superblock(stream, fuzz)?
        };

        let mut pvd = None;
        let mut svd = None;

        for i in 0..MAX_DESCRIPTOR_SCAN {
            let block = match read_block(stream, geometry, ISO_PVD_SECTOR + i) {
                Ok(block) => block,
                Err(_) if pvd.is_some() => break,
                Err(err) => return Err(err),
            };

            let Some(vd_type) = descriptor::descriptor_type(&block) else {
                if pvd.is_none() {
                    return Err(crate::Error::NotSupported);
                }
                break;
            };

            match vd_type {
                ISO_VD_PRIMARY if pvd.is_none() => {
                    pvd = Some(PrimaryVolumeDescriptor::read(&block)?);
                }
                ISO_VD_SUPPLEMENTARY if svd.is_none() => {
                    match SupplementaryVolumeDescriptor::read(&block) {
                        Ok(Some(descriptor)) => svd = Some(descriptor),
                        Ok(None) => debug!("supplementary descriptor without Joliet escape"),
                        Err(err) => warn!("skipping bad supplementary descriptor: {err}"),
                    }
                }
                ISO_VD_END => break,
                _ => {}
            }
        }

        let Some(pvd) = pvd else {
            return Err(crate::Error::NotSupported);
        };

        let mut volume = IsoVolume {
            geometry,
            pvd,
            svd,
            susp_skip: 0,
            rock_ridge: false,
        };

        // Learn the SUSP skip and Rock Ridge presence from the root's first record.
        let root = volume.root_entry();
        if let Ok(block) = read_block(stream, geometry, root.extent) {
            if let Ok(Some(record)) = directory::DirectoryRecord::read(&block) {
                let mut skip = volume.susp_skip;
                let rr = rockridge::parse(stream, geometry, record.system_use, &mut skip)?;
                volume.susp_skip = skip;
                volume.rock_ridge = rr.valid;
            }
        }

        Ok(volume)
    }

    /// Look up a path and return its metadata, or `None` if no entry exists.
    ///
    /// Components are matched against the decoded entry name, the raw identifier and the
    /// translated identifier, so both `/FOO.TXT;1` and `/foo.txt` resolve.
    ///
    /// # Arguments
    /// * `path` - Absolute path with `/` separators
    ///
    /// # Errors
    /// Returns an error only for I/O or structural failures, not for absent paths.
    pub fn stat(&mut self, path: &str) -> Result<Option<FileStat>> {
        let root = self.root_stat();
        let mut current = root;

        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !current.is_dir() {
                return Ok(None);
            }

            let entries = self.read_dir_entries(&current)?;
            let Some(next) = Self::match_component(entries, component) else {
                return Ok(None);
            };
            current = next;
        }

        Ok(Some(current))
    }

    /// List a directory.
    ///
    /// The result includes the `.` and `..` entries the volume records. Entries marked as
    /// relocated by Rock Ridge are hidden; they reappear at their child-link position.
    ///
    /// # Arguments
    /// * `path` - Absolute path of the directory
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] if the path does not resolve to a
    /// directory, or other errors for structural failures.
    pub fn readdir(&mut self, path: &str) -> Result<Vec<FileStat>> {
        let Some(stat) = self.stat(path)? else {
            return Err(malformed_error!("No such directory - {path}"));
        };
        if !stat.is_dir() {
            return Err(malformed_error!("Not a directory - {path}"));
        }

        Ok(self
            .read_dir_entries(&stat)?
            .into_iter()
            .map(|e| e.stat)
            .collect())
    }

    /// Find the entry that owns logical block `lsn`, together with its full path.
    ///
    /// Walks the directory tree depth-first and matches `lsn` against every entry's
    /// extents.
    ///
    /// # Errors
    /// Returns an error for structural failures while walking.
    pub fn find_by_block(&mut self, lsn: u32) -> Result<Option<(FileStat, String)>> {
        let root = self.root_stat();
        self.find_in_dir(&root, String::new(), lsn, 0)
    }

    /// Read the complete contents of a file.
    ///
    /// Extents are read sequentially; the result has exactly `stat.size` bytes.
    ///
    /// # Arguments
    /// * `stat` - Metadata of the file, as returned by [`stat`](Iso9660Reader::stat)
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if an extent lies outside the image.
    pub fn read_file(&mut self, stat: &FileStat) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        for extent in &stat.extents {
            let blocks = extent.size.div_ceil(BLOCK_SIZE);
            let raw = read_blocks(&mut self.stream, self.volume.geometry, extent.lsn, blocks)?;
            data.extend_from_slice(&raw[..extent.size as usize]);
        }
        Ok(data)
    }

    /// The volume identifier, preferring the Joliet descriptor when present.
    #[must_use]
    pub fn volume_id(&self) -> String {
        match &self.volume.svd {
            Some(svd) if !svd.volume_id.trim_end().is_empty() => {
                svd.volume_id.trim_end().to_string()
            }
            _ => self.volume.pvd.volume_id.trim_end().to_string(),
        }
    }

    /// The system identifier from the primary descriptor.
    #[must_use]
    pub fn system_id(&self) -> String {
        self.volume.pvd.system_id.trim_end().to_string()
    }

    /// The volume set identifier from the primary descriptor.
    #[must_use]
    pub fn volume_set_id(&self) -> String {
        self.volume.pvd.volume_set_id.trim_end().to_string()
    }

    /// The publisher identifier from the primary descriptor.
    #[must_use]
    pub fn publisher_id(&self) -> String {
        self.volume.pvd.publisher_id.trim_end().to_string()
    }

    /// The data preparer identifier from the primary descriptor.
    #[must_use]
    pub fn preparer_id(&self) -> String {
        self.volume.pvd.preparer_id.trim_end().to_string()
    }

    /// The application identifier from the primary descriptor.
    #[must_use]
    pub fn application_id(&self) -> String {
        self.volume.pvd.application_id.trim_end().to_string()
    }

    /// Joliet level of the volume, 0 when no Joliet descriptor is present.
    #[must_use]
    pub fn joliet_level(&self) -> u8 {
        self.volume.svd.as_ref().map_or(0, |svd| svd.joliet_level)
    }

    /// Returns `true` if Rock Ridge fields were found on the volume.
    #[must_use]
    pub fn has_rock_ridge(&self) -> bool {
        self.volume.rock_ridge
    }

    /// Translate a raw directory record identifier to its presented name.
    ///
    /// Strips the `;n` version suffix and lowercases the result, unless the
    /// volume carries a Joliet hierarchy, whose identifiers keep their case.
    #[must_use]
    pub fn translate_name(&self, identifier: &[u8]) -> String {
        name::translate(identifier, self.volume.is_joliet())
    }

    /// The decoded primary volume descriptor.
    #[must_use]
    pub fn primary_descriptor(&self) -> &PrimaryVolumeDescriptor {
        &self.volume.pvd
    }

    /// Number of logical blocks on the volume.
    #[must_use]
    pub fn volume_space_size(&self) -> u32 {
        self.volume.pvd.volume_space_size
    }

    /// Close the underlying stream. Idempotent; path-backed images reopen on next use.
    pub fn close(&mut self) {
        self.stream.close();
    }

    fn root_stat(&self) -> FileStat {
        let root = self.volume.root_entry();
        FileStat {
            name: ".".to_string(),
            kind: FileKind::Directory,
            size: u64::from(root.size),
            extents: vec![Extent {
                lsn: root.extent,
                size: root.size,
            }],
            time: None,
            posix: None,
            symlink: None,
            rock_ridge: self.volume.rock_ridge,
        }
    }

    fn read_dir_entries(&mut self, dir: &FileStat) -> Result<Vec<DirEntry>> {
        let Some(extent) = dir.extents.first() else {
            return Err(malformed_error!("Directory without extents"));
        };

        directory::read_directory(
            &mut self.stream,
            &mut self.volume,
            extent.lsn,
            extent.size,
        )
    }

    fn match_component(entries: Vec<DirEntry>, component: &str) -> Option<FileStat> {
        for entry in entries {
            if entry.stat.name == component {
                return Some(entry.stat);
            }
            if entry.raw_name == component.as_bytes() {
                return Some(entry.stat);
            }
            if name::translate(&entry.raw_name, false) == component {
                return Some(entry.stat);
            }
        }
        None
    }

    fn find_in_dir(
        &mut self,
        dir: &FileStat,
        prefix: String,
        lsn: u32,
        depth: usize,
    ) -> Result<Option<(FileStat, String)>> {
        if depth > MAX_DIR_DEPTH {
            return Err(crate::Error::RecursionLimit(MAX_DIR_DEPTH));
        }

        for entry in self.read_dir_entries(dir)? {
            if entry.stat.name == "." || entry.stat.name == ".." {
                continue;
            }

            let path = format!("{prefix}/{}", entry.stat.name);
            if entry.stat.contains_block(lsn) {
                return Ok(Some((entry.stat, path)));
            }

            if entry.stat.is_dir() {
                if let Some(found) = self.find_in_dir(&entry.stat, path, lsn, depth + 1)? {
                    return Ok(Some(found));
                }
            }
        }

        Ok(None)
    }
}

impl IsoVolume {
    /// Root directory location, taken from the Joliet descriptor when present.
    pub(crate) fn root_entry(&self) -> descriptor::RootDirectoryRecord {
        match &self.svd {
            Some(svd) => svd.root_record,
            None => self.pvd.root_record,
        }
    }

    /// Returns `true` if directory identifiers should be decoded as UCS-2.
    pub(crate) fn is_joliet(&self) -> bool {
        self.svd.is_some()
    }
}
