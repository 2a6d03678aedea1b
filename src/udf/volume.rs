//! UDF volume structure discovery.
//!
//! Walks from the anchor volume descriptor pointer at sector 256 through the main volume
//! descriptor sequence, collecting the partition descriptor, the logical volume
//! descriptor and the volume identification strings, then reads the file set descriptor
//! to find the root directory ICB.

use tracing::warn;

use crate::{
    file::{parser::Parser, VolumeStream},
    udf::{
        decode_dstring,
        tag::{
            DescriptorTag, TAG_ANCHOR, TAG_FILESET, TAG_LOGICAL_VOLUME, TAG_PARTITION,
            TAG_PRIMARY_VOLUME, TAG_TERMINATOR,
        },
        UDF_BLOCKSIZE,
    },
    Result,
};

/// Sector of the first anchor volume descriptor pointer.
pub(crate) const UDF_ANCHOR_SECTOR: u32 = 256;

/// A long allocation descriptor: extent length, partition-relative block and partition
/// reference number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct LongAd {
    /// Extent length in bytes, with the two type bits masked off
    pub len: u32,
    /// Partition-relative logical block number
    pub lba: u32,
    /// Partition reference number
    pub partition: u16,
}

impl LongAd {
    /// Read the 16-byte long allocation descriptor at `offset`.
    pub(crate) fn read(data: &[u8], offset: usize) -> Result<LongAd> {
        let mut parser = Parser::new(data);
        parser.seek(offset)?;
        let len = parser.read_le::<u32>()? & 0x3FFF_FFFF;
        let lba = parser.read_le::<u32>()?;
        let partition = parser.read_le::<u16>()?;
        Ok(LongAd {
            len,
            lba,
            partition,
        })
    }
}

/// Partition descriptor fields needed for block address translation.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct PartitionDescriptor {
    /// Partition number referenced by long allocation descriptors
    pub number: u16,
    /// First sector of the partition in volume space
    pub start: u32,
    /// Partition length in sectors
    pub length: u32,
}

impl PartitionDescriptor {
    fn read(block: &[u8]) -> Result<PartitionDescriptor> {
        let mut parser = Parser::new(block);
        parser.seek(22)?;
        let number = parser.read_le::<u16>()?;
        parser.seek(188)?;
        let start = parser.read_le::<u32>()?;
        let length = parser.read_le::<u32>()?;
        Ok(PartitionDescriptor {
            number,
            start,
            length,
        })
    }
}

/// Logical volume descriptor fields: identifier, block size and the file set location.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogicalVolumeDescriptor {
    /// Logical volume identifier
    pub volume_id: String,
    /// Logical block size, required to be 2048
    pub block_size: u32,
    /// Location of the file set descriptor within the partition
    pub fsd: LongAd,
}

impl LogicalVolumeDescriptor {
    fn read(block: &[u8]) -> Result<LogicalVolumeDescriptor> {
        if block.len() < 264 {
            return Err(out_of_bounds_error!());
        }
        let volume_id = decode_dstring(&block[84..212]);
        let mut parser = Parser::new(block);
        parser.seek(212)?;
        let block_size = parser.read_le::<u32>()?;
        let fsd = LongAd::read(block, 248)?;
        Ok(LogicalVolumeDescriptor {
            volume_id,
            block_size,
            fsd,
        })
    }
}

/// Everything discovered from the volume descriptor sequence and the file set
/// descriptor.
#[derive(Debug, Clone, Default)]
pub(crate) struct UdfVolume {
    /// Volume identifier from the primary volume descriptor
    pub volume_id: String,
    /// Volume set identifier from the primary volume descriptor
    pub volume_set_id: String,
    /// Logical volume identifier
    pub logical_volume_id: String,
    /// File set identifier
    pub fileset_id: String,
    /// The single data partition
    pub partition: PartitionDescriptor,
    /// Root directory ICB from the file set descriptor
    pub root_icb: LongAd,
}

impl UdfVolume {
    /// Translate a partition-relative block to an absolute sector.
    pub(crate) fn absolute(&self, lba: u32) -> u32 {
        self.partition.start.wrapping_add(lba)
    }
}

/// Read one 2048-byte sector from volume space.
pub(crate) fn read_sector(stream: &mut VolumeStream, lsn: u32) -> Result<Vec<u8>> {
    let offset = u64::from(lsn) * u64::from(UDF_BLOCKSIZE);
    Ok(stream.slice_at(offset, UDF_BLOCKSIZE as usize)?.to_vec())
}

/// Discover the volume structures of a UDF image.
///
/// # Errors
/// Returns [`crate::Error::NotSupported`] if sector 256 holds no anchor descriptor, and
/// [`crate::Error::Malformed`] if the descriptor sequence is incomplete or the logical
/// block size is not 2048.
pub(crate) fn discover(stream: &mut VolumeStream) -> Result<UdfVolume> {
    let anchor = read_sector(stream, UDF_ANCHOR_SECTOR)?;
    if DescriptorTag::check(&anchor, TAG_ANCHOR, Some(UDF_ANCHOR_SECTOR)).is_err() {
        return Err(crate::Error::NotSupported);
    }

    let mut parser = Parser::new(&anchor);
    parser.seek(16)?;
    let mvds_len = parser.read_le::<u32>()?;
    let mvds_start = parser.read_le::<u32>()?;
    if mvds_len == 0 {
        return Err(malformed_error!("Anchor points at an empty descriptor sequence"));
    }
    let mvds_end = mvds_start
        .checked_add((mvds_len - 1) / UDF_BLOCKSIZE)
        .ok_or_else(|| malformed_error!("Descriptor sequence wraps the address space"))?;

    let mut volume = UdfVolume::default();
    let mut partition = None;
    let mut logical = None;

    for lsn in mvds_start..=mvds_end {
        let block = read_sector(stream, lsn)?;
        let tag = match DescriptorTag::read(&block) {
            Ok(tag) => tag,
            Err(_) => {
                warn!("skipping unreadable descriptor at sector {lsn}");
                continue;
            }
        };

        match tag.id {
            TAG_PRIMARY_VOLUME => {
                if volume.volume_id.is_empty() && block.len() >= 200 {
                    volume.volume_id = decode_dstring(&block[24..56]);
                    volume.volume_set_id = decode_dstring(&block[72..200]);
                }
            }
            TAG_PARTITION => {
                if partition.is_none() {
                    partition = Some(PartitionDescriptor::read(&block)?);
                }
            }
            TAG_LOGICAL_VOLUME => {
                if logical.is_none() {
                    logical = Some(LogicalVolumeDescriptor::read(&block)?);
                }
            }
            TAG_TERMINATOR => break,
            _ => {}
        }
    }

    let Some(partition) = partition else {
        return Err(malformed_error!("Descriptor sequence has no partition descriptor"));
    };
    let Some(logical) = logical else {
        return Err(malformed_error!(
            "Descriptor sequence has no logical volume descriptor"
        ));
    };
    if logical.block_size != UDF_BLOCKSIZE {
        return Err(malformed_error!(
            "Unsupported logical block size {}",
            logical.block_size
        ));
    }

    volume.partition = partition;
    volume.logical_volume_id = logical.volume_id;

    // The file set descriptor lives in partition space.
    let fsd_lsn = partition
        .start
        .checked_add(logical.fsd.lba)
        .ok_or_else(|| out_of_bounds_error!())?;
    let fsd_block = read_sector(stream, fsd_lsn)?;
    DescriptorTag::check(&fsd_block, TAG_FILESET, Some(logical.fsd.lba))?;
    if fsd_block.len() < 416 {
        return Err(out_of_bounds_error!());
    }
    volume.fileset_id = decode_dstring(&fsd_block[304..336]);
    volume.root_icb = LongAd::read(&fsd_block, 400)?;

    Ok(volume)
}
