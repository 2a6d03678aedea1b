//! UDF descriptor tag parsing and integrity checks.
//!
//! Every ECMA-167 descriptor opens with a 16-byte tag carrying the descriptor type, a
//! header checksum, a CRC over the descriptor body and the block the descriptor claims to
//! live at. All three are verified here before any descriptor payload is trusted.

use crate::{file::parser::Parser, Result};

/// Tag identifier: primary volume descriptor.
pub const TAG_PRIMARY_VOLUME: u16 = 0x0001;
/// Tag identifier: anchor volume descriptor pointer.
pub const TAG_ANCHOR: u16 = 0x0002;
/// Tag identifier: partition descriptor.
pub const TAG_PARTITION: u16 = 0x0005;
/// Tag identifier: logical volume descriptor.
pub const TAG_LOGICAL_VOLUME: u16 = 0x0006;
/// Tag identifier: terminating descriptor.
pub const TAG_TERMINATOR: u16 = 0x0008;
/// Tag identifier: file set descriptor.
pub const TAG_FILESET: u16 = 0x0100;
/// Tag identifier: file identifier descriptor.
pub const TAG_FILE_IDENTIFIER: u16 = 0x0101;
/// Tag identifier: file entry.
pub const TAG_FILE_ENTRY: u16 = 0x0105;
/// Tag identifier: extended file entry.
pub const TAG_EXTENDED_FILE_ENTRY: u16 = 0x010A;

/// CRC-CCITT (polynomial 0x1021, initial value 0) over `data`.
pub(crate) fn crc_ccitt(data: &[u8]) -> u16 {
    let mut crc: u16 = 0;
    for &byte in data {
        crc ^= u16::from(byte) << 8;
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
    }
    crc
}

/// A verified 16-byte descriptor tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescriptorTag {
    /// Descriptor type identifier
    pub id: u16,
    /// Descriptor version
    pub version: u16,
    /// Tag serial number
    pub serial: u16,
    /// Block the descriptor claims to be recorded at
    pub location: u32,
}

impl DescriptorTag {
    /// Parse and verify the tag at the start of `data`.
    ///
    /// The header checksum (byte 4, the sum of the other fifteen header bytes) and the
    /// descriptor CRC over the body must both validate.
    ///
    /// # Arguments
    /// * `data` - The descriptor, starting with its 16-byte tag
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for checksum or CRC mismatches and
    /// [`crate::Error::OutOfBounds`] if the descriptor is truncated.
    pub fn read(data: &[u8]) -> Result<DescriptorTag> {
        if data.len() < 16 {
            return Err(out_of_bounds_error!());
        }

        let mut checksum = 0u8;
        for (i, &b) in data[..16].iter().enumerate() {
            if i != 4 {
                checksum = checksum.wrapping_add(b);
            }
        }
        if checksum != data[4] {
            return Err(malformed_error!(
                "Descriptor tag checksum mismatch - computed {checksum:#04x}, recorded {:#04x}",
                data[4]
            ));
        }

        let mut parser = Parser::new(data);
        let id = parser.read_le::<u16>()?;
        let version = parser.read_le::<u16>()?;
        parser.advance_by(2)?; // checksum byte, reserved
        let serial = parser.read_le::<u16>()?;
        let crc = parser.read_le::<u16>()?;
        let crc_len = usize::from(parser.read_le::<u16>()?);
        let location = parser.read_le::<u32>()?;

        if crc_len > 0 {
            if 16 + crc_len > data.len() {
                return Err(malformed_error!(
                    "Descriptor CRC length {crc_len} exceeds available data"
                ));
            }
            let computed = crc_ccitt(&data[16..16 + crc_len]);
            if computed != crc {
                return Err(malformed_error!(
                    "Descriptor CRC mismatch - computed {computed:#06x}, recorded {crc:#06x}"
                ));
            }
        }

        Ok(DescriptorTag {
            id,
            version,
            serial,
            location,
        })
    }

    /// Parse the tag and require a specific identifier and recorded location.
    ///
    /// # Arguments
    /// * `data` - The descriptor bytes
    /// * `expected_id` - Required tag identifier
    /// * `expected_location` - Required recorded block, when known
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] on any mismatch.
    pub fn check(
        data: &[u8],
        expected_id: u16,
        expected_location: Option<u32>,
    ) -> Result<DescriptorTag> {
        let tag = Self::read(data)?;

        if tag.id != expected_id {
            return Err(malformed_error!(
                "Unexpected descriptor tag - wanted {expected_id:#06x}, found {:#06x}",
                tag.id
            ));
        }
        if let Some(location) = expected_location {
            if tag.location != location {
                return Err(malformed_error!(
                    "Descriptor recorded at {} but read from {location}",
                    tag.location
                ));
            }
        }

        Ok(tag)
    }
}

/// Serialize a tag over `body` for the given location. Used by tests building volumes.
#[cfg(test)]
pub(crate) fn make_tag(id: u16, location: u32, body: &[u8]) -> [u8; 16] {
    let mut tag = [0u8; 16];
    tag[0..2].copy_from_slice(&id.to_le_bytes());
    tag[2..4].copy_from_slice(&2u16.to_le_bytes());
    tag[8..10].copy_from_slice(&crc_ccitt(body).to_le_bytes());
    tag[10..12].copy_from_slice(&(body.len() as u16).to_le_bytes());
    tag[12..16].copy_from_slice(&location.to_le_bytes());

    let mut checksum = 0u8;
    for (i, &b) in tag.iter().enumerate() {
        if i != 4 {
            checksum = checksum.wrapping_add(b);
        }
    }
    tag[4] = checksum;
    tag
}
