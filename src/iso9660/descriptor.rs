//! Volume descriptor decoding for ISO 9660 superblocks.
//!
//! This module decodes the primary and supplementary volume descriptors found from sector
//! 16 onward. The primary descriptor is the superblock of the filesystem; a supplementary
//! descriptor whose escape sequences announce UCS-2 identifiers marks a Joliet volume and
//! carries a second directory hierarchy with long names.
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use discscope::iso9660::descriptor::PrimaryVolumeDescriptor;
//!
//! let pvd = PrimaryVolumeDescriptor::read(&block)?;
//! println!("{} blocks of {} bytes", pvd.volume_space_size, pvd.logical_block_size);
//! println!("Root directory at block {}", pvd.root_record.extent);
//! # Ok::<(), discscope::Error>(())
//! ```

use crate::{
    file::parser::Parser,
    iso9660::{
        name::{decode_strd, decode_ucs2be},
        read_both_u16, read_both_u32, ISO_STANDARD_ID, ISO_VD_PRIMARY, ISO_VD_SUPPLEMENTARY,
    },
    DiscTime, Result,
};

/// Location and size of the root directory, from the 34-byte record embedded in a volume
/// descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootDirectoryRecord {
    /// First logical block of the root directory extent
    pub extent: u32,
    /// Size of the root directory in bytes
    pub size: u32,
}

/// Returns the descriptor type if `block` carries the `CD001` standard identifier.
pub(crate) fn descriptor_type(block: &[u8]) -> Option<u8> {
    if block.len() < 7 || &block[1..6] != ISO_STANDARD_ID {
        return None;
    }
    Some(block[0])
}

/// Decode the embedded root directory record at `offset`.
fn read_root_record(data: &[u8], offset: usize) -> Result<RootDirectoryRecord> {
    let mut parser = Parser::new(data);
    parser.seek(offset + 2)?;
    let extent = read_both_u32(&mut parser)?;
    let size = read_both_u32(&mut parser)?;
    Ok(RootDirectoryRecord { extent, size })
}

/// The primary volume descriptor, the superblock of an ISO 9660 filesystem.
///
/// All identifier fields are decoded to owned strings with their on-disc space padding
/// preserved; callers trim as needed. The four long-form timestamps decode to `None` when
/// the volume records the all-zero "not specified" form.
///
/// # Examples
///
/// ```rust,ignore
/// use discscope::iso9660::descriptor::PrimaryVolumeDescriptor;
///
/// let pvd = PrimaryVolumeDescriptor::read(&block)?;
/// assert_eq!(pvd.logical_block_size, 2048);
/// # Ok::<(), discscope::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct PrimaryVolumeDescriptor {
    /// System identifier (a-characters)
    pub system_id: String,
    /// Volume identifier (d-characters)
    pub volume_id: String,
    /// Number of logical blocks on the volume
    pub volume_space_size: u32,
    /// Number of volumes in the set
    pub volume_set_size: u16,
    /// Position of this volume in the set
    pub volume_sequence_number: u16,
    /// Logical block size in bytes
    pub logical_block_size: u16,
    /// Size of the path table in bytes
    pub path_table_size: u32,
    /// Block of the little-endian path table
    pub type_l_path_table: u32,
    /// Block of the big-endian path table
    pub type_m_path_table: u32,
    /// Location of the root directory
    pub root_record: RootDirectoryRecord,
    /// Volume set identifier
    pub volume_set_id: String,
    /// Publisher identifier
    pub publisher_id: String,
    /// Data preparer identifier
    pub preparer_id: String,
    /// Application identifier
    pub application_id: String,
    /// Volume creation time
    pub creation_time: Option<DiscTime>,
    /// Volume modification time
    pub modification_time: Option<DiscTime>,
    /// Volume expiration time
    pub expiration_time: Option<DiscTime>,
    /// Volume effective time
    pub effective_time: Option<DiscTime>,
}

impl PrimaryVolumeDescriptor {
    /// Decode a primary volume descriptor from one logical block.
    ///
    /// # Arguments
    /// * `data` - The 2048-byte descriptor block
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the standard identifier or type is wrong,
    /// and [`crate::Error::OutOfBounds`] if the block is truncated.
    pub fn read(data: &[u8]) -> Result<PrimaryVolumeDescriptor> {
        if descriptor_type(data) != Some(ISO_VD_PRIMARY) {
            return Err(malformed_error!("Not a primary volume descriptor"));
        }
        if data.len() < 882 {
            return Err(out_of_bounds_error!());
        }

        let mut parser = Parser::new(data);

        parser.seek(8)?;
        let system_id = decode_strd(parser.read_bytes(32)?);
        let volume_id = decode_strd(parser.read_bytes(32)?);

        parser.seek(80)?;
        let volume_space_size = read_both_u32(&mut parser)?;

        parser.seek(120)?;
        let volume_set_size = read_both_u16(&mut parser)?;
        let volume_sequence_number = read_both_u16(&mut parser)?;
        let logical_block_size = read_both_u16(&mut parser)?;
        let path_table_size = read_both_u32(&mut parser)?;
        let type_l_path_table = parser.read_le::<u32>()?;
        parser.advance_by(4)?; // optional L path table
        let type_m_path_table = parser.read_be::<u32>()?;

        let root_record = read_root_record(data, 156)?;

        parser.seek(190)?;
        let volume_set_id = decode_strd(parser.read_bytes(128)?);
        let publisher_id = decode_strd(parser.read_bytes(128)?);
        let preparer_id = decode_strd(parser.read_bytes(128)?);
        let application_id = decode_strd(parser.read_bytes(128)?);

        parser.seek(813)?;
        let creation_time = DiscTime::from_ltime(parser.read_bytes(17)?);
        let modification_time = DiscTime::from_ltime(parser.read_bytes(17)?);
        let expiration_time = DiscTime::from_ltime(parser.read_bytes(17)?);
        let effective_time = DiscTime::from_ltime(parser.read_bytes(17)?);

        Ok(PrimaryVolumeDescriptor {
            system_id,
            volume_id,
            volume_space_size,
            volume_set_size,
            volume_sequence_number,
            logical_block_size,
            path_table_size,
            type_l_path_table,
            type_m_path_table,
            root_record,
            volume_set_id,
            publisher_id,
            preparer_id,
            application_id,
            creation_time,
            modification_time,
            expiration_time,
            effective_time,
        })
    }
}

/// A Joliet supplementary volume descriptor.
///
/// Only supplementary descriptors whose escape sequences announce UCS-2 level 1 to 3 are
/// represented; others are reported as absent by [`read`](SupplementaryVolumeDescriptor::read).
#[derive(Debug, Clone)]
pub struct SupplementaryVolumeDescriptor {
    /// Joliet level, 1 to 3
    pub joliet_level: u8,
    /// Volume identifier, decoded from UCS-2
    pub volume_id: String,
    /// Location of the Joliet directory hierarchy
    pub root_record: RootDirectoryRecord,
}

impl SupplementaryVolumeDescriptor {
    /// Decode a supplementary volume descriptor from one logical block.
    ///
    /// Returns `Ok(None)` for supplementary descriptors without a Joliet escape sequence.
    ///
    /// # Arguments
    /// * `data` - The 2048-byte descriptor block
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the standard identifier or type is wrong.
    pub fn read(data: &[u8]) -> Result<Option<SupplementaryVolumeDescriptor>> {
        if descriptor_type(data) != Some(ISO_VD_SUPPLEMENTARY) {
            return Err(malformed_error!("Not a supplementary volume descriptor"));
        }
        if data.len() < 882 {
            return Err(out_of_bounds_error!());
        }

        // Escape sequences: 0x25 0x2F then 0x40/0x43/0x45 for Joliet level 1/2/3
        let escape = &data[88..120];
        let joliet_level = if escape[0] == 0x25 && escape[1] == 0x2F {
            match escape[2] {
                0x40 => 1,
                0x43 => 2,
                0x45 => 3,
                _ => return Ok(None),
            }
        } else {
            return Ok(None);
        };

        let volume_id = decode_ucs2be(&data[40..72]);
        let root_record = read_root_record(data, 156)?;

        Ok(Some(SupplementaryVolumeDescriptor {
            joliet_level,
            volume_id,
            root_record,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_pvd() -> Vec<u8> {
        let mut block = vec![0u8; 2048];
        block[0] = ISO_VD_PRIMARY;
        block[1..6].copy_from_slice(ISO_STANDARD_ID);
        block[6] = 1; // version
        block[8..16].copy_from_slice(b"LINUX   ");
        for b in &mut block[16..40] {
            *b = b' ';
        }
        block[40..46].copy_from_slice(b"MYDISC");
        for b in &mut block[46..72] {
            *b = b' ';
        }

        // volume_space_size = 500 (733)
        block[80..84].copy_from_slice(&500u32.to_le_bytes());
        block[84..88].copy_from_slice(&500u32.to_be_bytes());
        // volume_set_size = 1, sequence = 1, block size = 2048 (723)
        block[120..122].copy_from_slice(&1u16.to_le_bytes());
        block[122..124].copy_from_slice(&1u16.to_be_bytes());
        block[124..126].copy_from_slice(&1u16.to_le_bytes());
        block[126..128].copy_from_slice(&1u16.to_be_bytes());
        block[128..130].copy_from_slice(&2048u16.to_le_bytes());
        block[130..132].copy_from_slice(&2048u16.to_be_bytes());

        // root record: extent 20, size 2048
        block[156] = 34;
        block[158..162].copy_from_slice(&20u32.to_le_bytes());
        block[162..166].copy_from_slice(&20u32.to_be_bytes());
        block[166..170].copy_from_slice(&2048u32.to_le_bytes());
        block[170..174].copy_from_slice(&2048u32.to_be_bytes());

        block[813..830].copy_from_slice(b"2004060212304500\x04");
        block
    }

    #[test]
    fn read_primary() {
        let block = minimal_pvd();
        let pvd = PrimaryVolumeDescriptor::read(&block).unwrap();

        assert_eq!(pvd.system_id.trim_end(), "LINUX");
        assert_eq!(pvd.volume_id.trim_end(), "MYDISC");
        assert_eq!(pvd.volume_space_size, 500);
        assert_eq!(pvd.logical_block_size, 2048);
        assert_eq!(pvd.root_record.extent, 20);
        assert_eq!(pvd.root_record.size, 2048);
        assert_eq!(pvd.creation_time.unwrap().year, 2004);
        assert!(pvd.modification_time.is_none());
    }

    #[test]
    fn mismatched_both_endian_rejected() {
        let mut block = minimal_pvd();
        block[84..88].copy_from_slice(&999u32.to_be_bytes());
        assert!(PrimaryVolumeDescriptor::read(&block).is_err());
    }

    #[test]
    fn wrong_identifier_rejected() {
        let mut block = minimal_pvd();
        block[1..6].copy_from_slice(b"XX001");
        assert!(PrimaryVolumeDescriptor::read(&block).is_err());
        assert_eq!(descriptor_type(&block), None);
    }

    #[test]
    fn joliet_escape_detection() {
        let mut block = minimal_pvd();
        block[0] = ISO_VD_SUPPLEMENTARY;

        // no escape: not Joliet
        assert!(SupplementaryVolumeDescriptor::read(&block)
            .unwrap()
            .is_none());

        block[88] = 0x25;
        block[89] = 0x2F;
        block[90] = 0x45;

        // UCS-2 volume id
        let name: Vec<u8> = "JDISC"
            .encode_utf16()
            .flat_map(|u| u.to_be_bytes())
            .collect();
        for b in &mut block[40..72] {
            *b = 0;
        }
        block[40..40 + name.len()].copy_from_slice(&name);

        let svd = SupplementaryVolumeDescriptor::read(&block)
            .unwrap()
            .unwrap();
        assert_eq!(svd.joliet_level, 3);
        assert_eq!(svd.volume_id, "JDISC");
        assert_eq!(svd.root_record.extent, 20);
    }
}
