//! UDF file entries and directory records.
//!
//! A file or directory is described by an information control block holding a file entry
//! (or extended file entry) with POSIX attributes, timestamps and the allocation
//! descriptors that locate the data. Directory data is a run of file identifier
//! descriptors, one per entry.

use tracing::warn;

use crate::{
    file::parser::Parser,
    stat::{DiscTime, Extent, FileKind, PosixAttributes, S_IFDIR, S_IFLNK, S_IFREG, S_ISGID, S_ISUID, S_ISVTX},
    udf::{
        decode_dchars,
        tag::{DescriptorTag, TAG_EXTENDED_FILE_ENTRY, TAG_FILE_ENTRY, TAG_FILE_IDENTIFIER},
        volume::UdfVolume,
    },
    Result,
};

/// ICB file type: directory.
const ICB_FILE_TYPE_DIRECTORY: u8 = 4;
/// ICB file type: regular file.
const ICB_FILE_TYPE_REGULAR: u8 = 5;
/// ICB file type: symbolic link.
const ICB_FILE_TYPE_SYMLINK: u8 = 12;

/// ICB flag: set-user-id.
const ICB_FLAG_SETUID: u16 = 0x40;
/// ICB flag: set-group-id.
const ICB_FLAG_SETGID: u16 = 0x80;
/// ICB flag: sticky.
const ICB_FLAG_STICKY: u16 = 0x100;

/// File identifier characteristic: hidden entry.
pub(crate) const FID_CHAR_HIDDEN: u8 = 0x01;
/// File identifier characteristic: directory.
pub(crate) const FID_CHAR_DIRECTORY: u8 = 0x02;
/// File identifier characteristic: deleted entry.
pub(crate) const FID_CHAR_DELETED: u8 = 0x04;
/// File identifier characteristic: parent directory.
pub(crate) const FID_CHAR_PARENT: u8 = 0x08;

/// The ICB tag embedded in every file entry.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct IcbTag {
    /// Allocation strategy, only type 4 is supported
    pub strategy_type: u16,
    /// File type discriminator
    pub file_type: u8,
    /// ICB flags, the low three bits select the allocation descriptor form
    pub flags: u16,
}

impl IcbTag {
    fn read(data: &[u8], offset: usize) -> Result<IcbTag> {
        let mut parser = Parser::new(data);
        parser.seek(offset + 4)?;
        let strategy_type = parser.read_le::<u16>()?;
        parser.seek(offset + 11)?;
        let file_type = parser.read_le::<u8>()?;
        parser.seek(offset + 18)?;
        let flags = parser.read_le::<u16>()?;
        Ok(IcbTag {
            strategy_type,
            file_type,
            flags,
        })
    }
}

/// A parsed file entry or extended file entry.
#[derive(Debug, Clone, Default)]
pub(crate) struct FileEntry {
    /// The embedded ICB tag
    pub icb: IcbTag,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// UDF permission bits
    pub permissions: u32,
    /// Hard link count
    pub link_count: u16,
    /// File size in bytes
    pub info_len: u64,
    /// Last access time
    pub access_time: Option<DiscTime>,
    /// Last modification time
    pub modification_time: Option<DiscTime>,
    /// Data extents in absolute sectors
    pub extents: Vec<Extent>,
}

impl FileEntry {
    /// Parse the file entry recorded at partition-relative block `lba`.
    ///
    /// Both the plain and the extended layout are accepted. Allocation descriptors are
    /// resolved to absolute sectors through `volume`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for bad tags or truncated entries and
    /// [`crate::Error::NotSupported`] for allocation strategies other than type 4.
    pub(crate) fn read(block: &[u8], volume: &UdfVolume, lba: u32) -> Result<FileEntry> {
        let tag = DescriptorTag::read(block)?;
        if tag.id != TAG_FILE_ENTRY && tag.id != TAG_EXTENDED_FILE_ENTRY {
            return Err(malformed_error!(
                "Expected a file entry, found tag {:#06x}",
                tag.id
            ));
        }
        if tag.location != lba {
            return Err(malformed_error!(
                "File entry recorded at {} but read from {lba}",
                tag.location
            ));
        }
        let extended = tag.id == TAG_EXTENDED_FILE_ENTRY;

        let icb = IcbTag::read(block, 16)?;
        if icb.strategy_type != 4 {
            return Err(crate::Error::NotSupported);
        }

        let mut parser = Parser::new(block);
        parser.seek(36)?;
        let uid = parser.read_le::<u32>()?;
        let gid = parser.read_le::<u32>()?;
        let permissions = parser.read_le::<u32>()?;
        let link_count = parser.read_le::<u16>()?;
        parser.seek(56)?;
        let info_len = parser.read_le::<u64>()?;

        let times_offset = if extended { 80 } else { 72 };
        let access_time = timestamp_at(block, times_offset)?;
        let modification_time = timestamp_at(block, times_offset + 12)?;

        let (ea_offset, ad_offset) = if extended { (208, 212) } else { (168, 172) };
        parser.seek(ea_offset)?;
        let ea_len = parser.read_le::<u32>()? as usize;
        parser.seek(ad_offset)?;
        let ad_len = parser.read_le::<u32>()? as usize;
        let descs_start = if extended { 216 } else { 176 } + ea_len;
        if descs_start + ad_len > block.len() {
            return Err(malformed_error!(
                "Allocation descriptors extend past the file entry"
            ));
        }

        let extents = read_allocation_descriptors(
            &block[descs_start..descs_start + ad_len],
            icb.flags & 0x07,
            volume,
            info_len,
        )?;

        Ok(FileEntry {
            icb,
            uid,
            gid,
            permissions,
            link_count,
            info_len,
            access_time,
            modification_time,
            extents,
        })
    }

    /// File kind from the ICB file type.
    pub(crate) fn kind(&self) -> FileKind {
        match self.icb.file_type {
            ICB_FILE_TYPE_DIRECTORY => FileKind::Directory,
            ICB_FILE_TYPE_REGULAR => FileKind::File,
            ICB_FILE_TYPE_SYMLINK => FileKind::Symlink,
            _ => FileKind::Other,
        }
    }

    /// Synthesize POSIX attributes from the UDF permission and ICB flag bits.
    pub(crate) fn posix(&self) -> PosixAttributes {
        let perm = self.permissions;
        let mut mode = 0u32;
        // other, group, owner each carry execute/write/read as bits 0..2, 5..7, 10..12
        mode |= perm & 0o7;
        mode |= (perm >> 5 & 0o7) << 3;
        mode |= (perm >> 10 & 0o7) << 6;

        mode |= match self.icb.file_type {
            ICB_FILE_TYPE_DIRECTORY => S_IFDIR,
            ICB_FILE_TYPE_SYMLINK => S_IFLNK,
            _ => S_IFREG,
        };

        if self.icb.flags & ICB_FLAG_SETUID != 0 {
            mode |= S_ISUID;
        }
        if self.icb.flags & ICB_FLAG_SETGID != 0 {
            mode |= S_ISGID;
        }
        if self.icb.flags & ICB_FLAG_STICKY != 0 {
            mode |= S_ISVTX;
        }

        PosixAttributes {
            mode,
            nlink: u32::from(self.link_count),
            uid: self.uid,
            gid: self.gid,
        }
    }
}

/// Decode the 12-byte timestamp at `offset`, if the entry is large enough.
fn timestamp_at(block: &[u8], offset: usize) -> Result<Option<DiscTime>> {
    if offset + 12 > block.len() {
        return Err(out_of_bounds_error!());
    }
    let mut stamp = [0u8; 12];
    stamp.copy_from_slice(&block[offset..offset + 12]);
    Ok(DiscTime::from_udf_timestamp(&stamp))
}

/// Walk the allocation descriptor area and resolve recorded extents.
///
/// Only type 0 extents (recorded and allocated) contribute data. Embedded data (ICB flag
/// value 3) is skipped with a diagnostic.
fn read_allocation_descriptors(
    area: &[u8],
    ad_form: u16,
    volume: &UdfVolume,
    info_len: u64,
) -> Result<Vec<Extent>> {
    let mut extents = Vec::new();

    let stride = match ad_form {
        0 => 8,
        1 => 16,
        2 => 18,
        _ => {
            warn!("file data embedded in the ICB is not supported, treating as empty");
            return Ok(extents);
        }
    };

    let mut covered = 0u64;
    let mut offset = 0usize;
    while offset + stride <= area.len() && covered < info_len {
        let mut parser = Parser::new(area);
        parser.seek(offset)?;
        let raw_len = parser.read_le::<u32>()?;
        let len = raw_len & 0x3FFF_FFFF;
        let extent_type = raw_len >> 30;
        let lba = match ad_form {
            0 => parser.read_le::<u32>()?,
            1 => parser.read_le::<u32>()?,
            _ => {
                // ext_ad carries recorded and information lengths before the location
                parser.advance_by(8)?;
                parser.read_le::<u32>()?
            }
        };
        offset += stride;

        if len == 0 {
            break;
        }
        if extent_type == 3 {
            warn!("allocation descriptor chains are not supported, truncating");
            break;
        }
        if extent_type != 0 {
            // allocated but not recorded, no data to read
            continue;
        }

        extents.push(Extent {
            lsn: volume.absolute(lba),
            size: len,
        });
        covered += u64::from(len);
    }

    Ok(extents)
}

/// One directory entry parsed from a file identifier descriptor.
#[derive(Debug, Clone)]
pub(crate) struct FileIdentifier {
    /// Characteristic bits
    pub characteristics: u8,
    /// Decoded entry name, `..` for the parent entry
    pub name: String,
    /// ICB of the entry, partition-relative
    pub icb_lba: u32,
}

impl FileIdentifier {
    /// True when the entry records a deletion and carries no ICB.
    pub(crate) fn is_deleted(&self) -> bool {
        self.characteristics & FID_CHAR_DELETED != 0
    }

    /// True for the parent directory entry.
    pub(crate) fn is_parent(&self) -> bool {
        self.characteristics & FID_CHAR_PARENT != 0
    }
}

/// Parse the run of file identifier descriptors making up a directory's data.
///
/// # Errors
/// Returns [`crate::Error::Malformed`] if a descriptor fails its tag checks or overruns
/// the directory data.
pub(crate) fn read_identifiers(data: &[u8]) -> Result<Vec<FileIdentifier>> {
    let mut entries = Vec::new();
    let mut offset = 0usize;

    while offset + 38 <= data.len() {
        let record = &data[offset..];
        let tag = DescriptorTag::read(record)?;
        if tag.id != TAG_FILE_IDENTIFIER {
            return Err(malformed_error!(
                "Expected a file identifier, found tag {:#06x}",
                tag.id
            ));
        }

        let mut parser = Parser::new(record);
        parser.seek(18)?;
        let characteristics = parser.read_le::<u8>()?;
        let name_len = usize::from(parser.read_le::<u8>()?);
        parser.seek(24)?;
        let icb_lba = parser.read_le::<u32>()?;
        parser.seek(36)?;
        let imp_use_len = usize::from(parser.read_le::<u16>()?);

        let name_start = 38 + imp_use_len;
        let record_len = 4 * ((name_start + name_len + 3) / 4);
        if offset + record_len > data.len() {
            return Err(malformed_error!(
                "File identifier overruns the directory data"
            ));
        }

        let name = if characteristics & FID_CHAR_PARENT != 0 {
            String::from("..")
        } else {
            decode_dchars(&record[name_start..name_start + name_len])
        };

        entries.push(FileIdentifier {
            characteristics,
            name,
            icb_lba,
        });
        offset += record_len;
    }

    Ok(entries)
}
