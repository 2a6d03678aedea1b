//! Directory record decoding and directory extent walking.
//!
//! Directories are extents of 2048-byte blocks packed with variable-length records. This
//! module decodes single records, walks whole extents, folds multi-extent files into one
//! entry, and synthesizes [`crate::FileStat`] values with Rock Ridge and Joliet applied.
//!
//! Records never straddle a sector boundary; a zero length byte means the remainder of
//! the sector is padding and decoding continues at the next one.

use bitflags::bitflags;
use tracing::warn;

use crate::{
    file::{parser::Parser, VolumeStream},
    iso9660::{
        name, read_block, read_blocks, read_both_u16, read_both_u32, rockridge, IsoVolume,
        ISO_BLOCKSIZE, ISO_MAX_MULTIEXTENT,
    },
    stat::{S_IFDIR, S_IFLNK, S_IFMT, S_IFREG},
    DiscTime, Extent, FileKind, FileStat, Result,
};

bitflags! {
    /// File flags of a directory record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileFlags: u8 {
        /// Entry should be hidden from casual listings
        const HIDDEN = 1;
        /// Entry is a directory
        const DIRECTORY = 2;
        /// Entry is an associated file
        const ASSOCIATED = 4;
        /// Entry has record format information
        const RECORD = 8;
        /// Entry has owner/group permissions
        const PROTECTION = 16;
        /// Entry continues in another record
        const MULTI_EXTENT = 128;
    }
}

/// One decoded directory record, borrowing identifier and system-use bytes.
pub(crate) struct DirectoryRecord<'a> {
    /// Total record length in bytes
    pub length: u8,
    /// Extended attribute record length in blocks
    pub ext_attr_length: u8,
    /// First logical block of the entry's data
    pub extent: u32,
    /// Data length in bytes
    pub size: u32,
    /// Recording time
    pub time: Option<DiscTime>,
    /// File flags
    pub flags: FileFlags,
    /// Volume sequence number
    pub volume_sequence_number: u16,
    /// Raw identifier; `\0` for `.`, `\x01` for `..`
    pub identifier: &'a [u8],
    /// System-use area for SUSP entries
    pub system_use: &'a [u8],
}

impl<'a> DirectoryRecord<'a> {
    /// Decode the record starting at `data[0]`.
    ///
    /// Returns `Ok(None)` when the length byte is zero, which marks sector padding.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for impossible lengths and
    /// [`crate::Error::OutOfBounds`] if the record runs past the available data.
    pub fn read(data: &'a [u8]) -> Result<Option<DirectoryRecord<'a>>> {
        let Some(&length) = data.first() else {
            return Err(out_of_bounds_error!());
        };
        if length == 0 {
            return Ok(None);
        }
        if length < 34 {
            return Err(malformed_error!("Directory record too short - {length}"));
        }
        if usize::from(length) > data.len() {
            return Err(out_of_bounds_error!());
        }

        let record = &data[..usize::from(length)];
        let mut parser = Parser::new(record);

        parser.seek(1)?;
        let ext_attr_length = parser.read_le::<u8>()?;
        let extent = read_both_u32(&mut parser)?;
        let size = read_both_u32(&mut parser)?;
        let time = DiscTime::from_dtime(parser.read_bytes(7)?);
        let flags = FileFlags::from_bits_truncate(parser.read_le::<u8>()?);
        parser.advance_by(2)?; // file unit size, interleave gap
        let volume_sequence_number = read_both_u16(&mut parser)?;
        let name_len = usize::from(parser.read_le::<u8>()?);

        if 33 + name_len > usize::from(length) {
            return Err(malformed_error!(
                "Directory record identifier overruns record - {name_len}"
            ));
        }
        let identifier = &record[33..33 + name_len];

        // identifier is padded so the system use area starts at an even offset
        let mut su_start = 33 + name_len;
        if name_len % 2 == 0 {
            su_start += 1;
        }
        let system_use = if su_start < usize::from(length) {
            &record[su_start..]
        } else {
            &[]
        };

        Ok(Some(DirectoryRecord {
            length,
            ext_attr_length,
            extent,
            size,
            time,
            flags,
            volume_sequence_number,
            identifier,
            system_use,
        }))
    }
}

/// A directory entry with the raw identifier kept for path matching.
pub(crate) struct DirEntry {
    pub stat: FileStat,
    pub raw_name: Vec<u8>,
}

struct PendingMulti {
    identifier: Vec<u8>,
    extents: Vec<Extent>,
    poisoned: bool,
}

/// Walk one directory extent and synthesize stats for all of its records.
pub(crate) fn read_directory(
    stream: &mut VolumeStream,
    volume: &mut IsoVolume,
    extent: u32,
    size: u32,
) -> Result<Vec<DirEntry>> {
    let blocks = size.div_ceil(ISO_BLOCKSIZE);
    if u64::from(extent) + u64::from(blocks) > u64::from(volume.pvd.volume_space_size) {
        return Err(malformed_error!(
            "Directory at block {extent} with size {size} exceeds the volume"
        ));
    }
    let data = read_blocks(stream, volume.geometry, extent, blocks)?;

    let mut entries = Vec::new();
    let mut pending: Option<PendingMulti> = None;
    let mut offset = 0usize;
    let limit = size as usize;

    while offset < limit {
        let length = usize::from(data[offset]);
        let sector_pos = offset % ISO_BLOCKSIZE as usize;

        if length == 0 {
            offset = offset - sector_pos + ISO_BLOCKSIZE as usize;
            continue;
        }
        if sector_pos + length > ISO_BLOCKSIZE as usize {
            warn!("directory record straddles a sector boundary, skipping to next sector");
            offset = offset - sector_pos + ISO_BLOCKSIZE as usize;
            continue;
        }

        let record = match DirectoryRecord::read(&data[offset..]) {
            Ok(Some(record)) => record,
            Ok(None) => unreachable!("zero length handled above"),
            Err(err) => {
                warn!("bad directory record at offset {offset}: {err}");
                break;
            }
        };

        let part = Extent {
            lsn: record.extent,
            size: record.size,
        };

        if record.flags.contains(FileFlags::MULTI_EXTENT) {
            match &mut pending {
                Some(multi) => {
                    if multi.identifier != record.identifier {
                        warn!("multi-extent part with mismatched identifier, dropping entry");
                        multi.poisoned = true;
                    } else if multi.extents.len() >= ISO_MAX_MULTIEXTENT {
                        warn!("multi-extent file exceeds {ISO_MAX_MULTIEXTENT} parts, dropping entry");
                        multi.poisoned = true;
                    } else {
                        multi.extents.push(part);
                    }
                }
                None => {
                    pending = Some(PendingMulti {
                        identifier: record.identifier.to_vec(),
                        extents: vec![part],
                        poisoned: false,
                    });
                }
            }
            offset += length;
            continue;
        }

        let folded = match pending.take() {
            Some(multi) => {
                if multi.poisoned {
                    offset += length;
                    continue;
                }
                if multi.identifier != record.identifier {
                    warn!("final multi-extent part with mismatched identifier, dropping entry");
                    offset += length;
                    continue;
                }
                let mut extents = multi.extents;
                extents.push(part);
                Some(extents)
            }
            None => None,
        };

        if let Some(entry) = entry_to_stat(stream, volume, &record, folded)? {
            entries.push(entry);
        }

        offset += length;
    }

    if pending.is_some() {
        warn!("directory ended inside a multi-extent chain");
    }

    Ok(entries)
}

/// Build a [`FileStat`] for one record, applying Rock Ridge and Joliet.
///
/// Returns `None` for entries hidden by a Rock Ridge `RE` marker.
fn entry_to_stat(
    stream: &mut VolumeStream,
    volume: &mut IsoVolume,
    record: &DirectoryRecord,
    folded: Option<Vec<Extent>>,
) -> Result<Option<DirEntry>> {
    let mut skip = volume.susp_skip;
    let rr = rockridge::parse(stream, volume.geometry, record.system_use, &mut skip)?;
    volume.susp_skip = skip;
    if rr.valid {
        volume.rock_ridge = true;
    }

    if rr.relocated {
        return Ok(None);
    }

    let name = match record.identifier {
        [0x00] | [] => ".".to_string(),
        [0x01] => "..".to_string(),
        id => match &rr.name {
            Some(name) => name.clone(),
            None if volume.is_joliet() => name::decode_ucs2be(id),
            None => name::translate(id, false),
        },
    };

    let mut kind = if let Some(posix) = &rr.posix {
        match posix.mode & S_IFMT {
            S_IFDIR => FileKind::Directory,
            S_IFLNK => FileKind::Symlink,
            S_IFREG => FileKind::File,
            _ => FileKind::Other,
        }
    } else if record.flags.contains(FileFlags::DIRECTORY) {
        FileKind::Directory
    } else {
        FileKind::File
    };
    if rr.symlink.is_some() {
        kind = FileKind::Symlink;
    }

    let mut extents = folded.unwrap_or_else(|| {
        vec![Extent {
            lsn: record.extent,
            size: record.size,
        }]
    });
    let mut size: u64 = extents.iter().map(|e| u64::from(e.size)).sum();

    // A child link redirects the entry to a relocated directory.
    if let Some(target_block) = rr.child_link {
        match resolve_child_link(stream, volume, target_block) {
            Some((target_extent, target_size)) => {
                extents = vec![Extent {
                    lsn: target_extent,
                    size: target_size,
                }];
                size = u64::from(target_size);
                kind = FileKind::Directory;
            }
            None => {
                warn!("child link target at block {target_block} did not resolve, keeping entry");
            }
        }
    }

    let stat = FileStat {
        name,
        kind,
        size,
        extents,
        time: rr.modify_time.or(record.time),
        posix: rr.posix,
        symlink: rr.symlink,
        rock_ridge: rr.valid,
    };

    Ok(Some(DirEntry {
        stat,
        raw_name: record.identifier.to_vec(),
    }))
}

/// Read the `.` record of a relocated directory to take over its data.
fn resolve_child_link(
    stream: &mut VolumeStream,
    volume: &IsoVolume,
    block: u32,
) -> Option<(u32, u32)> {
    let data = read_block(stream, volume.geometry, block).ok()?;
    match DirectoryRecord::read(&data) {
        Ok(Some(record)) if record.flags.contains(FileFlags::DIRECTORY) => {
            Some((record.extent, record.size))
        }
        _ => None,
    }
}
